//! Bucket connection configuration.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use super::source::{ConfigSource, config_path};
use crate::{Error, Result, TRACING_TARGET_CONFIG};

/// Default bucket name, for local testing only.
pub const DEFAULT_BUCKET_NAME: &str = "example.com";
/// Default access key, for local testing only.
pub const DEFAULT_BUCKET_KEY: &str = "ABCDE";
/// Default secret key, for local testing only.
pub const DEFAULT_BUCKET_SECRET: &str = "example_secret";
/// Default session token (none).
pub const DEFAULT_BUCKET_TOKEN: &str = "";
/// Default region.
pub const DEFAULT_BUCKET_REGION: &str = "us-west-1";
/// Default number of keys requested per listing page.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;
/// Largest page size S3 accepts for a single listing call.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Configuration for a bucket connector.
///
/// Every field can also be loaded from a scoped key-value source with
/// [`BucketConfig::from_source`], using the field name as the key.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct BucketConfig {
    /// Bucket used by `save_file` and `write_file`
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-name", env = "BUCKET_NAME", default_value = DEFAULT_BUCKET_NAME)
    )]
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Access key ID (empty uses the default AWS credential chain)
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-key", env = "BUCKET_KEY", default_value = DEFAULT_BUCKET_KEY)
    )]
    #[serde(default = "default_bucket_key")]
    pub bucket_key: String,

    /// Secret access key
    #[cfg_attr(
        feature = "config",
        arg(
            long = "bucket-secret",
            env = "BUCKET_SECRET",
            default_value = DEFAULT_BUCKET_SECRET,
            hide_env_values = true
        )
    )]
    #[serde(skip_serializing, default = "default_bucket_secret")]
    pub bucket_secret: String,

    /// Session token for temporary credentials
    #[cfg_attr(
        feature = "config",
        arg(
            long = "bucket-token",
            env = "BUCKET_TOKEN",
            default_value = DEFAULT_BUCKET_TOKEN,
            hide_env_values = true
        )
    )]
    #[serde(skip_serializing, default)]
    pub bucket_token: String,

    /// Region the bucket lives in
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-region", env = "BUCKET_REGION", default_value = DEFAULT_BUCKET_REGION)
    )]
    #[serde(default = "default_bucket_region")]
    pub bucket_region: String,

    /// Custom endpoint URL for S3-compatible services (e.g. MinIO)
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-endpoint", env = "BUCKET_ENDPOINT")
    )]
    #[serde(default)]
    pub bucket_endpoint: Option<String>,

    /// Store objects written with `write_file` as publicly readable
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-public-read", env = "BUCKET_PUBLIC_READ")
    )]
    #[serde(default)]
    pub bucket_public_read: bool,

    /// Maximum number of keys requested per listing page
    #[cfg_attr(
        feature = "config",
        arg(long = "bucket-page-size", env = "BUCKET_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)
    )]
    #[serde(default = "default_page_size")]
    pub bucket_page_size: i32,
}

fn default_bucket_name() -> String {
    DEFAULT_BUCKET_NAME.to_owned()
}

fn default_bucket_key() -> String {
    DEFAULT_BUCKET_KEY.to_owned()
}

fn default_bucket_secret() -> String {
    DEFAULT_BUCKET_SECRET.to_owned()
}

fn default_bucket_region() -> String {
    DEFAULT_BUCKET_REGION.to_owned()
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            bucket_name: default_bucket_name(),
            bucket_key: default_bucket_key(),
            bucket_secret: default_bucket_secret(),
            bucket_token: DEFAULT_BUCKET_TOKEN.to_owned(),
            bucket_region: default_bucket_region(),
            bucket_endpoint: None,
            bucket_public_read: false,
            bucket_page_size: default_page_size(),
        }
    }
}

impl BucketConfig {
    /// Create a new configuration for the named bucket, other fields defaulted.
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            ..Self::default()
        }
    }

    /// Loads the configuration of `scope` from a key-value source.
    ///
    /// Reads `{scope}.bucket_name`, `{scope}.bucket_key` and so on. Missing
    /// keys fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a boolean or integer value cannot be
    /// parsed.
    pub fn from_source<S>(scope: &str, source: &S) -> Result<Self>
    where
        S: ConfigSource + ?Sized,
    {
        let read = |key: &str| source.get(&config_path(scope, key));
        let defaults = Self::default();

        let config = Self {
            bucket_name: read("bucket_name").unwrap_or(defaults.bucket_name),
            bucket_key: read("bucket_key").unwrap_or(defaults.bucket_key),
            bucket_secret: read("bucket_secret").unwrap_or(defaults.bucket_secret),
            bucket_token: read("bucket_token").unwrap_or(defaults.bucket_token),
            bucket_region: read("bucket_region").unwrap_or(defaults.bucket_region),
            bucket_endpoint: read("bucket_endpoint").filter(|endpoint| !endpoint.is_empty()),
            bucket_public_read: parse_value(scope, "bucket_public_read", read("bucket_public_read"))?
                .unwrap_or(defaults.bucket_public_read),
            bucket_page_size: parse_value(scope, "bucket_page_size", read("bucket_page_size"))?
                .unwrap_or(defaults.bucket_page_size),
        };

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            scope = scope,
            bucket_name = %config.bucket_name,
            bucket_region = %config.bucket_region,
            default_credentials = config.uses_default_credentials(),
            "Loaded bucket configuration"
        );

        Ok(config)
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.bucket_region = region.into();
        self
    }

    /// Set static credentials.
    #[must_use]
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.bucket_key = key.into();
        self.bucket_secret = secret.into();
        self
    }

    /// Set the session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bucket_token = token.into();
        self
    }

    /// Set a custom endpoint for S3-compatible services.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.bucket_endpoint = Some(endpoint.into());
        self
    }

    /// Store objects written with `write_file` as publicly readable.
    #[must_use]
    pub fn with_public_read(mut self, public_read: bool) -> Self {
        self.bucket_public_read = public_read;
        self
    }

    /// Set the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.bucket_page_size = page_size;
        self
    }

    /// Returns the session token, if one is configured.
    #[inline]
    pub fn session_token(&self) -> Option<&str> {
        Some(self.bucket_token.as_str()).filter(|token| !token.is_empty())
    }

    /// Returns whether static credentials are configured.
    ///
    /// Without them the S3 backend falls back to the default AWS provider chain.
    #[inline]
    pub fn has_static_credentials(&self) -> bool {
        !self.bucket_key.is_empty()
    }

    /// Returns whether the built-in testing credentials are in effect.
    pub fn uses_default_credentials(&self) -> bool {
        self.bucket_key == DEFAULT_BUCKET_KEY && self.bucket_secret == DEFAULT_BUCKET_SECRET
    }

    /// Returns a masked version of the access key for logging.
    pub fn access_key_masked(&self) -> String {
        let visible: String = self.bucket_key.chars().take(4).collect();
        if visible.is_empty() {
            String::new()
        } else {
            format!("{visible}****")
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - the bucket name or region is empty
    /// - the page size is outside `1..=1000`
    /// - a secret is missing while an access key is set
    /// - the endpoint is not an http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(Error::configuration().with_message("Bucket name cannot be empty"));
        }

        if self.bucket_region.trim().is_empty() {
            return Err(Error::configuration().with_message("Bucket region cannot be empty"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.bucket_page_size) {
            return Err(Error::configuration().with_message(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.bucket_page_size
            )));
        }

        if self.has_static_credentials() && self.bucket_secret.is_empty() {
            return Err(Error::configuration().with_message("Secret key cannot be empty"));
        }

        if let Some(endpoint) = &self.bucket_endpoint {
            let url = Url::parse(endpoint).map_err(|e| {
                Error::from_source(crate::ErrorKind::Configuration, e)
                    .with_message(format!("Invalid endpoint URL: {endpoint}"))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::configuration().with_message(format!(
                    "Invalid endpoint scheme '{}', expected http or https",
                    url.scheme()
                )));
            }
        }

        if self.uses_default_credentials() {
            tracing::warn!(
                target: TRACING_TARGET_CONFIG,
                bucket_name = %self.bucket_name,
                "Default testing credentials are in use"
            );
        }

        Ok(())
    }
}

impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("bucket_name", &self.bucket_name)
            .field("bucket_key", &self.access_key_masked())
            .field("bucket_region", &self.bucket_region)
            .field("bucket_endpoint", &self.bucket_endpoint)
            .field("bucket_public_read", &self.bucket_public_read)
            .field("bucket_page_size", &self.bucket_page_size)
            .finish_non_exhaustive()
    }
}

/// Parses an optional raw value, naming the offending key on failure.
fn parse_value<T>(scope: &str, key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = raw else {
        return Ok(None);
    };

    raw.trim().parse().map(Some).map_err(|e| {
        Error::from_source(crate::ErrorKind::Configuration, e)
            .with_message(format!("Invalid value '{raw}'"))
            .with_context(config_path(scope, key))
    })
}
