#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for connector lifecycle and caller-facing operations.
///
/// Use this target for logging open/close, uploads and deletion workflows.
pub const TRACING_TARGET_CONNECTOR: &str = "nvisy_bucket::connector";

/// Tracing target for storage backend calls.
///
/// Use this target for logging individual list, put, get and delete requests.
pub const TRACING_TARGET_STORAGE: &str = "nvisy_bucket::storage";

/// Tracing target for configuration loading.
pub const TRACING_TARGET_CONFIG: &str = "nvisy_bucket::config";

pub mod config;
pub mod connector;
mod error;
pub mod storage;

pub use tokio_util::sync::CancellationToken;

pub use crate::config::{BucketConfig, ConfigSource, EnvSource};
pub use crate::connector::{BucketConnector, UploadRequest};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
#[cfg(feature = "s3")]
pub use crate::storage::S3Storage;
pub use crate::storage::{
    BucketInfo, ContinuationToken, MemoryStorage, ObjectAcl, ObjectData, ObjectPage, PutObject,
    StorageClient,
};
