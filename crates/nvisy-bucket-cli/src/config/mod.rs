//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── bucket: BucketConfig   # Name, credentials, region, endpoint, paging
//! ├── scope / config_file    # Scoped key-value configuration
//! ├── backend                # s3 or memory
//! └── command: Command       # The operation to run
//! ```
//!
//! Bucket settings come from one of three places, in order of precedence:
//!
//! 1. `--config-file`: a flat JSON object keyed by `{scope}.{field}`.
//! 2. `--scoped-env`: environment variables named `{SCOPE}_{FIELD}`.
//! 3. The `--bucket-*` flags and their `BUCKET_*` environment variables.
//!
//! # Example
//!
//! ```bash
//! nvisy-bucket --bucket-name media --bucket-region eu-west-1 list --prefix logs/
//!
//! UPLOADS_BUCKET_NAME=media nvisy-bucket --scope uploads --scoped-env delete-prefix logs/
//! ```

mod source;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use nvisy_bucket::{BucketConfig, BucketConnector, EnvSource, MemoryStorage};

pub use self::source::JsonSource;
use crate::commands::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Storage backend the connector talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// S3 or an S3-compatible service.
    #[default]
    S3,
    /// Process-local store, for dry runs.
    Memory,
}

/// Complete CLI configuration.
#[derive(Debug, Parser)]
#[command(name = "nvisy-bucket")]
#[command(about = "Manage objects in S3-compatible buckets")]
#[command(version)]
pub struct Cli {
    /// Bucket connection configuration.
    #[clap(flatten)]
    pub bucket: BucketConfig,

    /// Configuration scope the connector is bound to.
    #[arg(long, env = "BUCKET_SCOPE", default_value = "bucket")]
    pub scope: String,

    /// Flat JSON file holding `{scope}.{field}` settings.
    #[arg(long, env = "BUCKET_CONFIG_FILE", conflicts_with = "scoped_env")]
    pub config_file: Option<PathBuf>,

    /// Read settings from `{SCOPE}_{FIELD}` environment variables.
    #[arg(long)]
    pub scoped_env: bool,

    /// Storage backend.
    #[arg(long, env = "BUCKET_BACKEND", value_enum, default_value_t = Backend::S3)]
    pub backend: Backend,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BUCKET_LOG_JSON")]
    pub log_json: bool,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments so its values can
    /// serve as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Resolves the bucket configuration from the selected source.
    pub fn bucket_config(&self) -> anyhow::Result<BucketConfig> {
        if let Some(path) = &self.config_file {
            let source = JsonSource::from_path(path)?;
            tracing::debug!(
                target: TRACING_TARGET_CONFIG,
                path = %path.display(),
                keys = source.len(),
                "Loaded configuration file"
            );
            return BucketConfig::from_source(&self.scope, &source)
                .with_context(|| format!("invalid settings in {}", path.display()));
        }

        if self.scoped_env {
            return BucketConfig::from_source(&self.scope, &EnvSource)
                .context("invalid scoped environment settings");
        }

        Ok(self.bucket.clone())
    }

    /// Opens a connector over the selected backend.
    pub async fn connect(&self, config: BucketConfig) -> anyhow::Result<BucketConnector> {
        match self.backend {
            Backend::S3 => Ok(BucketConnector::open(self.scope.clone(), config).await?),
            Backend::Memory => {
                let storage = MemoryStorage::new()
                    .with_page_size(usize::try_from(config.bucket_page_size).unwrap_or(1))
                    .with_bucket(config.bucket_name.clone());
                Ok(BucketConnector::with_storage(
                    self.scope.clone(),
                    config,
                    storage,
                ))
            }
        }
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            scope = %self.scope,
            backend = ?self.backend,
            config_file = ?self.config_file,
            scoped_env = self.scoped_env,
            command = self.command.name(),
            "CLI configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nvisy-bucket").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_configure_bucket() {
        let cli = parse(&[
            "--bucket-name",
            "media",
            "--bucket-region",
            "eu-west-1",
            "--backend",
            "memory",
            "list-buckets",
        ]);

        assert_eq!(cli.backend, Backend::Memory);
        let config = cli.bucket_config().unwrap();
        assert_eq!(config.bucket_name, "media");
        assert_eq!(config.bucket_region, "eu-west-1");
    }

    #[test]
    fn test_config_file_overrides_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"uploads.bucket_name": "avatars", "uploads.bucket_page_size": 50}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = parse(&[
            "--bucket-name",
            "media",
            "--scope",
            "uploads",
            "--config-file",
            path,
            "list-buckets",
        ]);

        let config = cli.bucket_config().unwrap();
        assert_eq!(config.bucket_name, "avatars");
        assert_eq!(config.bucket_page_size, 50);
    }

    #[test]
    fn test_config_file_and_scoped_env_conflict() {
        let result = Cli::try_parse_from([
            "nvisy-bucket",
            "--config-file",
            "a.json",
            "--scoped-env",
            "list-buckets",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_has_configured_bucket() {
        let cli = parse(&["--bucket-name", "media", "--backend", "memory", "list-buckets"]);
        let connector = cli.connect(cli.bucket_config().unwrap()).await.unwrap();

        let buckets = connector.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "media");
    }
}
