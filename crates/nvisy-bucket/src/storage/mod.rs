//! Storage client seam and backends.
//!
//! [`StorageClient`] is the only way the connector talks to object storage.
//! Authentication, region selection, retries and connection pooling are the
//! backend's business; the connector only consumes these calls.
//!
//! Two backends ship with the crate:
//!
//! - [`S3Storage`] (feature `s3`): AWS S3 and S3-compatible services.
//! - [`MemoryStorage`]: an in-process store for tests and dry runs.

mod memory;
#[cfg(feature = "s3")]
#[cfg_attr(docsrs, doc(cfg(feature = "s3")))]
mod s3;
mod types;

pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
pub use types::{BucketInfo, ContinuationToken, ObjectAcl, ObjectData, ObjectPage, PutObject};

use crate::Result;

/// Object storage operations consumed by the bucket connector.
///
/// Implementations must be safe for concurrent use: one client is shared by
/// every connector clone and every in-flight workflow.
#[async_trait::async_trait]
pub trait StorageClient: Send + Sync {
    /// Enumerates the buckets visible to the configured credentials.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Creates a bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Fetches one page of keys starting with `prefix`.
    ///
    /// `cursor` is the token of the previous page, `None` starts from the
    /// beginning of the listing.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ObjectPage>;

    /// Writes an object, replacing any existing object under the same key.
    async fn put_object(&self, request: PutObject) -> Result<()>;

    /// Reads an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData>;

    /// Deletes the object stored under exactly `key`.
    ///
    /// Returns an error of kind [`NotFound`] when the backend reports that
    /// the object does not exist.
    ///
    /// [`NotFound`]: crate::ErrorKind::NotFound
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}
