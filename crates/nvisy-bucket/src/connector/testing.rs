//! Storage double that records calls and injects failures.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::storage::{
    BucketInfo, ContinuationToken, MemoryStorage, ObjectAcl, ObjectData, ObjectPage, PutObject,
    StorageClient,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { cursor: Option<String> },
    Put { key: String, acl: Option<ObjectAcl> },
    Delete(String),
}

/// Shared view of the calls a [`RecordingStorage`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) -> usize {
        let mut calls = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        calls.push(call);
        calls.iter().filter(|c| matches!(c, Call::List { .. })).count()
    }

    pub fn all(&self) -> Vec<Call> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn lists(&self) -> usize {
        self.all()
            .iter()
            .filter(|c| matches!(c, Call::List { .. }))
            .count()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(key) => Some(key),
                _ => None,
            })
            .collect()
    }
}

/// Wraps [`MemoryStorage`], logging list, put and delete calls.
#[derive(Debug, Clone)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    calls: CallLog,
    fail_list_on_page: Option<usize>,
    fail_delete_of: Option<String>,
    remove_before_delete: Option<String>,
    cancel_on_first_list: Option<CancellationToken>,
}

impl RecordingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            calls: CallLog::default(),
            fail_list_on_page: None,
            fail_delete_of: None,
            remove_before_delete: None,
            cancel_on_first_list: None,
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Fails the `page`-th listing request (1-based).
    pub fn fail_list_on_page(mut self, page: usize) -> Self {
        self.fail_list_on_page = Some(page);
        self
    }

    pub fn fail_delete_of(mut self, key: &str) -> Self {
        self.fail_delete_of = Some(key.to_owned());
        self
    }

    /// Simulates a concurrent writer removing `key` after it was listed.
    pub fn remove_before_delete(mut self, key: &str) -> Self {
        self.remove_before_delete = Some(key.to_owned());
        self
    }

    pub fn cancel_on_first_list(mut self, token: CancellationToken) -> Self {
        self.cancel_on_first_list = Some(token);
        self
    }
}

#[async_trait::async_trait]
impl StorageClient for RecordingStorage {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.inner.list_buckets().await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.inner.create_bucket(bucket).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ObjectPage> {
        let page = self.calls.push(Call::List {
            cursor: cursor.map(|c| c.as_str().to_owned()),
        });

        if self.fail_list_on_page == Some(page) {
            return Err(Error::transient_backend().with_message("injected listing failure"));
        }

        let result = self.inner.list_objects(bucket, prefix, cursor).await;
        if page == 1 {
            if let Some(token) = &self.cancel_on_first_list {
                token.cancel();
            }
        }
        result
    }

    async fn put_object(&self, request: PutObject) -> Result<()> {
        self.calls.push(Call::Put {
            key: request.key.clone(),
            acl: request.acl,
        });
        self.inner.put_object(request).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        self.inner.get_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.calls.push(Call::Delete(key.to_owned()));

        if self.fail_delete_of.as_deref() == Some(key) {
            return Err(Error::transient_backend().with_message("injected delete failure"));
        }
        if self.remove_before_delete.as_deref() == Some(key) {
            let _ = self.inner.delete_object(bucket, key).await;
        }

        self.inner.delete_object(bucket, key).await
    }
}
