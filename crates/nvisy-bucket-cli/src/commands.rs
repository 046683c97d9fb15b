//! Subcommands and their execution against a connector.
//!
//! Every command operates on the configured bucket except `list-buckets` and
//! `create-bucket`. Results are written to stdout, one item per line.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use clap::Subcommand;
use nvisy_bucket::{BucketConnector, CancellationToken, UploadRequest};

use crate::TRACING_TARGET_COMMAND;

/// Content type used when none is given or can be guessed.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Operation to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the buckets visible to the configured credentials.
    ListBuckets,

    /// Create a bucket.
    CreateBucket {
        /// Name of the bucket to create.
        name: String,
    },

    /// List object keys, following pagination.
    List {
        /// Only list keys starting with this prefix.
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Upload a local file.
    Upload {
        /// File to upload.
        path: PathBuf,
        /// Object key; defaults to the file name.
        #[arg(long)]
        key: Option<String>,
        /// MIME type stored with the object.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Store a JSON upload request (`file_name`, `category`, base64 `rowData`).
    Save {
        /// JSON file holding the request.
        path: PathBuf,
        /// MIME type stored with the object.
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
    },

    /// Download an object to a local file.
    Download {
        /// Object key.
        key: String,
        /// Destination file.
        path: PathBuf,
    },

    /// Delete a single object; a missing object is not an error.
    Delete {
        /// Object key.
        key: String,
    },

    /// Delete every object whose key starts with a prefix.
    ///
    /// Ctrl+C stops the deletion before the next page; objects already
    /// deleted stay deleted.
    DeletePrefix {
        /// Key prefix; an empty prefix deletes every object.
        prefix: String,
    },
}

impl Command {
    /// Returns the subcommand name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListBuckets => "list-buckets",
            Self::CreateBucket { .. } => "create-bucket",
            Self::List { .. } => "list",
            Self::Upload { .. } => "upload",
            Self::Save { .. } => "save",
            Self::Download { .. } => "download",
            Self::Delete { .. } => "delete",
            Self::DeletePrefix { .. } => "delete-prefix",
        }
    }

    /// Runs the command, printing results to stdout.
    pub async fn execute(
        self,
        connector: BucketConnector,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        self.run(&connector, &cancel, &mut std::io::stdout()).await
    }

    async fn run<W: Write>(
        self,
        connector: &BucketConnector,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> anyhow::Result<()> {
        let name = self.name();
        let bucket = connector.bucket_name().to_owned();

        tracing::debug!(
            target: TRACING_TARGET_COMMAND,
            command = name,
            bucket = %bucket,
            "Running command"
        );

        match self {
            Self::ListBuckets => {
                for info in connector.list_buckets().await? {
                    match info.created_at {
                        Some(created_at) => writeln!(out, "{}\t{created_at}", info.name)?,
                        None => writeln!(out, "{}", info.name)?,
                    }
                }
            }
            Self::CreateBucket { name } => {
                connector.create_bucket(&name).await?;
                writeln!(out, "{name}")?;
            }
            Self::List { prefix } => {
                for key in connector.list_keys(&bucket, &prefix, cancel).await? {
                    writeln!(out, "{key}")?;
                }
            }
            Self::Upload {
                path,
                key,
                content_type,
            } => {
                let key = match key {
                    Some(key) => key,
                    None => file_name(&path)?,
                };
                let content = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let url = connector
                    .upload(&bucket, &key, Bytes::from(content), content_type.as_deref())
                    .await?;
                writeln!(out, "{url}")?;
            }
            Self::Save { path, content_type } => {
                let json = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let request: UploadRequest = serde_json::from_str(&json)
                    .with_context(|| format!("invalid upload request in {}", path.display()))?;
                let url = connector.save_file(&request, &content_type).await?;
                writeln!(out, "{url}")?;
            }
            Self::Download { key, path } => {
                let object = connector.download(&bucket, &key).await?;
                tokio::fs::write(&path, &object.data)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                writeln!(out, "{}", path.display())?;
            }
            Self::Delete { key } => {
                connector.delete_object(&bucket, &key).await?;
                writeln!(out, "{key}")?;
            }
            Self::DeletePrefix { prefix } => {
                connector
                    .delete_with_prefix(&bucket, &prefix, cancel)
                    .await
                    .with_context(|| format!("failed to delete objects under '{prefix}'"))?;
            }
        }

        tracing::debug!(target: TRACING_TARGET_COMMAND, command = name, "Command finished");
        Ok(())
    }
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .with_context(|| format!("cannot derive an object key from {}", path.display()))
}
