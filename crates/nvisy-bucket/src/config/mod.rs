//! Bucket connector configuration.
//!
//! Configuration can come from three places:
//!
//! - a scoped key-value source ([`ConfigSource`]), where every key is prefixed
//!   with the caller-supplied scope (`uploads.bucket_name`),
//! - the process environment through [`EnvSource`] (`UPLOADS_BUCKET_NAME`),
//! - command-line arguments, when the `config` feature enables clap derives.
//!
//! Missing keys fall back to local-testing defaults. Those defaults must never
//! reach a production deployment; [`BucketConfig::uses_default_credentials`]
//! lets callers detect them.

mod bucket_config;
mod source;

pub use bucket_config::{
    BucketConfig, DEFAULT_BUCKET_KEY, DEFAULT_BUCKET_NAME, DEFAULT_BUCKET_REGION,
    DEFAULT_BUCKET_SECRET, DEFAULT_BUCKET_TOKEN, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use source::{ConfigSource, EnvSource, config_path};
