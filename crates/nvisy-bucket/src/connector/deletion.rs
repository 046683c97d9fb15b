//! Idempotent single-key deletion and the prefix deletion workflow.

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::bucket_connector::{BucketConnector, ensure_bucket};
use crate::storage::ContinuationToken;
use crate::{Error, Result, TRACING_TARGET_CONNECTOR};

impl BucketConnector {
    /// Deletes the object stored under exactly `key`.
    ///
    /// Issues a single delete request. A backend report that the object does
    /// not exist counts as success; every other error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket name is empty or the backend fails for
    /// any reason other than a missing object.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        ensure_bucket(bucket)?;

        match self.storage().delete_object(bucket, key).await {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET_CONNECTOR,
                    bucket = bucket,
                    key = key,
                    "Deleted object"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    target: TRACING_TARGET_CONNECTOR,
                    bucket = bucket,
                    key = key,
                    "Object already absent"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTOR,
                    bucket = bucket,
                    key = key,
                    error = %e,
                    "Failed to delete object"
                );
                Err(e)
            }
        }
    }

    /// Deletes every object whose key starts with `prefix`.
    ///
    /// Pages of matching keys are fetched one at a time and their keys are
    /// deleted sequentially in listing order with
    /// [`delete_object`](Self::delete_object). An empty prefix matches every
    /// object in the bucket.
    ///
    /// The first listing or delete failure aborts the workflow. Objects
    /// deleted before the failure stay deleted and nothing is retried.
    /// `cancel` is checked before each page is requested.
    ///
    /// # Errors
    ///
    /// Returns the first backend error, an invalid input error for an empty
    /// bucket name, or a cancellation error when `cancel` fires.
    #[instrument(skip(self, cancel), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope()))]
    pub async fn delete_with_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_bucket(bucket)?;

        let mut cursor: Option<ContinuationToken> = None;
        let mut deleted = 0_u64;
        let mut pages = 0_u64;

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(
                    target: TRACING_TARGET_CONNECTOR,
                    bucket = bucket,
                    prefix = prefix,
                    deleted = deleted,
                    pages = pages,
                    "Prefix deletion cancelled"
                );
                return Err(Error::cancelled().with_message(format!(
                    "Deletion of prefix '{prefix}' cancelled after {deleted} objects"
                )));
            }

            let page = self
                .storage()
                .list_objects(bucket, prefix, cursor.as_ref())
                .await
                .map_err(|e| {
                    tracing::error!(
                        target: TRACING_TARGET_CONNECTOR,
                        bucket = bucket,
                        prefix = prefix,
                        deleted = deleted,
                        error = %e,
                        "Failed to list objects"
                    );
                    e
                })?;
            pages += 1;

            for key in &page.keys {
                self.delete_object(bucket, key).await?;
                deleted += 1;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            target: TRACING_TARGET_CONNECTOR,
            bucket = bucket,
            prefix = prefix,
            deleted = deleted,
            pages = pages,
            "Deleted objects with prefix"
        );

        Ok(())
    }
}
