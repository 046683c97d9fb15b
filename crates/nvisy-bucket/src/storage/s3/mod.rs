//! S3 backend built on `aws-sdk-s3`.
//!
//! Works with AWS S3 and any S3-compatible service reachable through a custom
//! endpoint (MinIO, R2, ...). Retries, timeouts and connection pooling are
//! whatever the SDK is configured with; this module adds none of its own.

mod error;
mod s3_storage;

pub use s3_storage::S3Storage;
