//! Connector handle, lifecycle and passthrough operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[cfg(feature = "s3")]
use crate::storage::S3Storage;
use crate::storage::{BucketInfo, ContinuationToken, ObjectData, StorageClient};
use crate::{BucketConfig, Error, Result, TRACING_TARGET_CONNECTOR};

/// Bucket connector bound to one configuration scope.
///
/// This handle is cheaply cloneable and thread-safe. Clones share the same
/// storage client, which is released when the last clone is closed or dropped.
#[derive(Clone)]
pub struct BucketConnector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    scope: String,
    config: BucketConfig,
    storage: Arc<dyn StorageClient>,
}

impl Drop for ConnectorInner {
    fn drop(&mut self) {
        tracing::debug!(
            target: TRACING_TARGET_CONNECTOR,
            scope = %self.scope,
            "Released storage client"
        );
    }
}

impl BucketConnector {
    /// Opens a connector backed by S3.
    ///
    /// Builds the S3 client from `config`; no request is sent until the first
    /// operation. Use [`health_check`](Self::health_check) to verify
    /// connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 client cannot be built.
    #[cfg(feature = "s3")]
    #[cfg_attr(docsrs, doc(cfg(feature = "s3")))]
    #[instrument(skip(scope, config), target = TRACING_TARGET_CONNECTOR)]
    pub async fn open(scope: impl Into<String>, config: BucketConfig) -> Result<Self> {
        let scope = scope.into();
        let storage = S3Storage::connect(&config).await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTOR,
                scope = %scope,
                error = %e,
                "Failed to build S3 client"
            );
            e
        })?;

        Ok(Self::with_storage(scope, config, storage))
    }

    /// Opens a connector over any storage backend.
    pub fn with_storage(
        scope: impl Into<String>,
        config: BucketConfig,
        storage: impl StorageClient + 'static,
    ) -> Self {
        Self::from_shared(scope, config, Arc::new(storage))
    }

    /// Opens a connector over a storage client shared with other components.
    pub fn from_shared(
        scope: impl Into<String>,
        config: BucketConfig,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        let scope = scope.into();

        tracing::info!(
            target: TRACING_TARGET_CONNECTOR,
            scope = %scope,
            bucket_name = %config.bucket_name,
            bucket_region = %config.bucket_region,
            bucket_endpoint = ?config.bucket_endpoint,
            access_key = %config.access_key_masked(),
            "Starting bucket connector"
        );

        if config.uses_default_credentials() {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTOR,
                scope = %scope,
                "Bucket connector is using default testing credentials"
            );
        }

        Self {
            inner: Arc::new(ConnectorInner {
                scope,
                config,
                storage,
            }),
        }
    }

    /// Closes this handle.
    ///
    /// The storage client is released once no other clone holds it.
    pub fn close(self) {
        tracing::info!(
            target: TRACING_TARGET_CONNECTOR,
            scope = %self.inner.scope,
            open_handles = Arc::strong_count(&self.inner) - 1,
            "Stopped bucket connector"
        );
    }

    /// Runs `f` with this connector and closes it afterwards.
    ///
    /// The connector is closed whether `f` succeeds or fails; its result is
    /// returned unchanged. The error type is chosen by the caller.
    pub async fn scoped<F, Fut, T, E>(self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(BucketConnector) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let result = f(self.clone()).await;
        if let Err(e) = &result {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTOR,
                scope = %self.inner.scope,
                error = %e,
                "Scoped connector body failed"
            );
        }

        self.close();
        result
    }

    /// Returns the configuration scope.
    #[inline]
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &BucketConfig {
        &self.inner.config
    }

    /// Returns the configured bucket name.
    ///
    /// The name comes from the configuration captured when the connector was
    /// built. Changing the configuration source after [`open`](Self::open)
    /// has no effect; open a new connector to pick up a different bucket.
    #[inline]
    pub fn bucket_name(&self) -> &str {
        &self.inner.config.bucket_name
    }

    /// Returns the storage client.
    #[inline]
    pub fn storage(&self) -> &Arc<dyn StorageClient> {
        &self.inner.storage
    }

    /// Enumerates buckets.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.storage().list_buckets().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTOR,
                error = %e,
                "Failed to list buckets"
            );
            e
        })
    }

    /// Creates a bucket.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        ensure_bucket(bucket)?;

        self.storage().create_bucket(bucket).await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTOR,
                bucket = bucket,
                error = %e,
                "Failed to create bucket"
            );
            e
        })?;

        tracing::info!(target: TRACING_TARGET_CONNECTOR, bucket = bucket, "Created bucket");
        Ok(())
    }

    /// Downloads an object.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn download(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        ensure_bucket(bucket)?;

        let start = Instant::now();
        let object = self.storage().get_object(bucket, key).await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTOR,
                bucket = bucket,
                key = key,
                error = %e,
                "Failed to download object"
            );
            e
        })?;

        tracing::debug!(
            target: TRACING_TARGET_CONNECTOR,
            bucket = bucket,
            key = key,
            size = object.data.len(),
            elapsed = ?start.elapsed(),
            "Downloaded object"
        );

        Ok(object)
    }

    /// Lists every key starting with `prefix`, following pagination.
    ///
    /// Keys are returned in listing order. The cancellation token is checked
    /// before every page.
    #[instrument(skip(self, cancel), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        ensure_bucket(bucket)?;

        let mut keys = Vec::new();
        let mut cursor: Option<ContinuationToken> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled()
                    .with_message(format!("Listing of prefix '{prefix}' cancelled")));
            }

            let page = self
                .storage()
                .list_objects(bucket, prefix, cursor.as_ref())
                .await?;
            keys.extend(page.keys);

            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(keys),
            }
        }
    }

    /// Verifies the backend is reachable by enumerating buckets.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn health_check(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.storage().list_buckets().await;
        let elapsed = start.elapsed();

        match result {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_CONNECTOR,
                    elapsed = ?elapsed,
                    "Health check successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTOR,
                    error = %e,
                    elapsed = ?elapsed,
                    "Health check failed"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for BucketConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketConnector")
            .field("scope", &self.inner.scope)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Rejects an empty bucket name before any backend call.
pub(super) fn ensure_bucket(bucket: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        return Err(Error::invalid_input().with_message("Bucket name cannot be empty"));
    }
    Ok(())
}
