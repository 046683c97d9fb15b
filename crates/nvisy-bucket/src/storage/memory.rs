//! In-process storage backend.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use jiff::Timestamp;

use super::{BucketInfo, ContinuationToken, ObjectData, ObjectPage, PutObject, StorageClient};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::{Error, Result, TRACING_TARGET_STORAGE};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryBucket {
    created_at: Option<Timestamp>,
    objects: BTreeMap<String, StoredObject>,
}

type Buckets = BTreeMap<String, MemoryBucket>;

/// In-memory [`StorageClient`] with lexically ordered keys.
///
/// Listing pages hold at most `page_size` keys and use the last key of a page
/// as its continuation token. Deleting a missing key reports `NotFound`, like
/// the S3-compatible services that do, while a missing bucket is a backend
/// error. Clones share the same contents.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    buckets: Arc<RwLock<Buckets>>,
    page_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates an empty store with the default page size.
    pub fn new() -> Self {
        Self {
            buckets: Arc::default(),
            page_size: DEFAULT_PAGE_SIZE as usize,
        }
    }

    /// Sets the maximum number of keys per listing page (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds an empty bucket.
    #[must_use]
    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.write().entry(bucket.into()).or_insert_with(|| MemoryBucket {
            created_at: Some(Timestamp::now()),
            objects: BTreeMap::new(),
        });
        self
    }

    /// Stores an object, creating the bucket if needed.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.write()
            .entry(bucket.to_owned())
            .or_default()
            .objects
            .insert(key.to_owned(), StoredObject {
                data: data.into(),
                content_type: None,
            });
    }

    /// Returns whether `key` exists in `bucket`.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.read()
            .get(bucket)
            .is_some_and(|b| b.objects.contains_key(key))
    }

    /// Returns every key in `bucket`, in lexical order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.read()
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Buckets> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Buckets> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Missing buckets are a backend failure, not a missing object.
fn no_such_bucket(bucket: &str) -> Error {
    Error::transient_backend().with_message(format!("NoSuchBucket: {bucket}"))
}

#[async_trait::async_trait]
impl StorageClient for MemoryStorage {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let buckets = self
            .read()
            .iter()
            .map(|(name, bucket)| BucketInfo {
                name: name.clone(),
                created_at: bucket.created_at,
            })
            .collect();
        Ok(buckets)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.write();
        if buckets.contains_key(bucket) {
            return Err(Error::invalid_input()
                .with_message(format!("Bucket '{bucket}' already exists")));
        }

        buckets.insert(bucket.to_owned(), MemoryBucket {
            created_at: Some(Timestamp::now()),
            objects: BTreeMap::new(),
        });
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ObjectPage> {
        let buckets = self.read();
        let objects = &buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?.objects;

        let lower = match cursor {
            Some(token) => Bound::Excluded(token.as_str()),
            None => Bound::Included(prefix),
        };

        let mut matching = objects
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .skip_while(|key| !key.starts_with(prefix))
            .take_while(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(ContinuationToken::new(last.clone())),
            _ => None,
        };

        tracing::trace!(
            target: TRACING_TARGET_STORAGE,
            bucket = bucket,
            prefix = prefix,
            keys = keys.len(),
            has_more = next.is_some(),
            "Listed in-memory page"
        );

        Ok(ObjectPage::new(keys, next))
    }

    async fn put_object(&self, request: PutObject) -> Result<()> {
        let mut buckets = self.write();
        let bucket = buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| no_such_bucket(&request.bucket))?;

        bucket.objects.insert(request.key, StoredObject {
            data: request.body,
            content_type: request.content_type,
        });
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        let buckets = self.read();
        let object = buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .objects
            .get(key)
            .ok_or_else(|| Error::not_found().with_message(format!("NoSuchKey: {key}")))?;

        Ok(ObjectData {
            data: object.data.clone(),
            content_type: object.content_type.clone(),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.write();
        let objects = &mut buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .objects;

        match objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::not_found().with_message(format!("NoSuchKey: {key}"))),
        }
    }
}
