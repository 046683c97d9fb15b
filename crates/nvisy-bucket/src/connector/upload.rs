//! Object writes and the base64 upload surface.

use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::bucket_connector::{BucketConnector, ensure_bucket};
use crate::storage::{ObjectAcl, PutObject};
use crate::{Error, Result, TRACING_TARGET_CONNECTOR};

/// JSON body accepted by [`BucketConnector::save_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Object file name; a random UUID is used when empty.
    #[serde(default)]
    pub file_name: String,
    /// Key prefix the file is stored under.
    #[serde(default)]
    pub category: String,
    /// Base64 (standard alphabet) file content.
    #[serde(rename = "rowData")]
    pub raw_data: String,
}

impl UploadRequest {
    /// Builds a request from raw content, base64 encoding it.
    pub fn from_bytes(
        category: impl Into<String>,
        file_name: impl Into<String>,
        content: &[u8],
    ) -> Self {
        Self {
            file_name: file_name.into(),
            category: category.into(),
            raw_data: STANDARD.encode(content),
        }
    }

    /// Decodes the base64 payload.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error if the payload is not valid base64.
    pub fn decode(&self) -> Result<Bytes> {
        let content = STANDARD
            .decode(self.raw_data.trim())
            .map_err(|e| Error::from(e).with_context("rowData"))?;
        Ok(Bytes::from(content))
    }

    /// Returns the object key, generating a file name when none was given.
    pub fn object_key(&self) -> String {
        let file_name = if self.file_name.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.file_name.clone()
        };

        if self.category.is_empty() {
            file_name
        } else {
            format!("{}/{}", self.category, file_name)
        }
    }
}

/// Characters escaped in an object key when it is placed in a URL path.
///
/// Everything except unreserved characters and `$&+:=@` is escaped, so `/`
/// becomes `%2F` and the key stays a single path segment.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Returns the public URL of `key` in `bucket`.
///
/// The bucket is used verbatim as the host, so numeric names and mixed case
/// are kept as given. The key is escaped as a single path segment.
///
/// # Errors
///
/// Returns an invalid input error if `bucket` is empty or contains
/// whitespace or URL delimiters.
pub fn object_url(bucket: &str, key: &str) -> Result<String> {
    let invalid = bucket.is_empty()
        || bucket
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '@'));
    if invalid {
        return Err(
            Error::invalid_input().with_message(format!("Bucket '{bucket}' cannot form a URL"))
        );
    }

    Ok(format!("https://{bucket}/{}", utf8_percent_encode(key, KEY_SEGMENT)))
}

impl BucketConnector {
    /// Writes `content` under `key` and returns the object URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket or key is empty, or the backend fails.
    #[instrument(skip(self, content), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope(), size = content.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut request = PutObject::new(bucket, key, content);
        if let Some(content_type) = content_type {
            request = request.with_content_type(content_type);
        }
        self.put(request).await
    }

    /// Decodes a base64 upload and stores it in the configured bucket.
    ///
    /// The object is stored under `{category}/{file_name}`, or under just
    /// `{file_name}` when the category is empty. The stored length is the
    /// decoded length.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for malformed base64 and propagates
    /// backend failures.
    #[instrument(skip(self, request), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope(), category = %request.category))]
    pub async fn save_file(&self, request: &UploadRequest, content_type: &str) -> Result<String> {
        let content = request.decode().inspect_err(|e| {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTOR,
                error = %e,
                "Rejected upload with malformed content"
            );
        })?;

        let key = request.object_key();
        let put = PutObject::new(self.bucket_name(), key, content).with_content_type(content_type);
        self.put(put).await
    }

    /// Writes raw bytes under `key` in the configured bucket.
    ///
    /// Objects are publicly readable when the configuration enables
    /// `bucket_public_read`.
    #[instrument(skip(self, content), target = TRACING_TARGET_CONNECTOR, fields(scope = %self.scope(), size = content.len()))]
    pub async fn write_file(&self, key: &str, content: Bytes) -> Result<String> {
        let mut request = PutObject::new(self.bucket_name(), key, content);
        if self.config().bucket_public_read {
            request = request.with_acl(ObjectAcl::PublicRead);
        }
        self.put(request).await
    }

    async fn put(&self, request: PutObject) -> Result<String> {
        ensure_bucket(&request.bucket)?;
        if request.key.is_empty() {
            return Err(Error::invalid_input().with_message("Object key cannot be empty"));
        }

        let url = object_url(&request.bucket, &request.key)?;
        let bucket = request.bucket.clone();
        let key = request.key.clone();
        let size = request.content_length();
        let acl = request.acl.unwrap_or_default();

        let start = Instant::now();
        self.storage().put_object(request).await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTOR,
                bucket = %bucket,
                key = %key,
                error = %e,
                "Failed to upload object"
            );
            e
        })?;

        tracing::info!(
            target: TRACING_TARGET_CONNECTOR,
            bucket = %bucket,
            key = %key,
            size = size,
            acl = %acl,
            elapsed = ?start.elapsed(),
            "Uploaded object"
        );

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Call, RecordingStorage};
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::{BucketConfig, ErrorKind};

    fn connector(storage: RecordingStorage, public_read: bool) -> BucketConnector {
        let config = BucketConfig::new("media").with_public_read(public_read);
        BucketConnector::with_storage("uploads", config, storage)
    }

    #[test]
    fn test_object_url_escapes_key() {
        let url = object_url("media.example.com", "docs/a b.txt").unwrap();
        assert_eq!(url, "https://media.example.com/docs%2Fa%20b.txt");
    }

    #[test]
    fn test_object_url_keeps_bucket_verbatim() {
        assert_eq!(object_url("123", "a").unwrap(), "https://123/a");
        assert_eq!(object_url("0x1f", "a").unwrap(), "https://0x1f/a");
        assert_eq!(object_url("Media", "a").unwrap(), "https://Media/a");
    }

    #[test]
    fn test_object_url_keeps_sub_delims() {
        let url = object_url("media", "a+b=c@d~e:f$g&h.txt").unwrap();
        assert_eq!(url, "https://media/a+b=c@d~e:f$g&h.txt");

        let url = object_url("media", "q?x#y%z").unwrap();
        assert_eq!(url, "https://media/q%3Fx%23y%25z");
    }

    #[test]
    fn test_object_url_rejects_bad_bucket() {
        for bucket in ["", "bad bucket", "a/b", "a?b"] {
            let err = object_url(bucket, "a").unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_upload_request_wire_format() {
        let request: UploadRequest =
            serde_json::from_str(r#"{"file_name":"a.txt","category":"docs","rowData":"aGk="}"#)
                .unwrap();
        assert_eq!(request.raw_data, "aGk=");
        assert_eq!(request.decode().unwrap(), Bytes::from_static(b"hi"));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["rowData"], "aGk=");
    }

    #[test]
    fn test_object_key() {
        let request = UploadRequest::from_bytes("docs", "a.txt", b"x");
        assert_eq!(request.object_key(), "docs/a.txt");

        let request = UploadRequest::from_bytes("", "a.txt", b"x");
        assert_eq!(request.object_key(), "a.txt");

        let request = UploadRequest::from_bytes("docs", "", b"x");
        let key = request.object_key();
        let name = key.strip_prefix("docs/").unwrap();
        assert!(Uuid::parse_str(name).is_ok());
    }

    #[tokio::test]
    async fn test_save_file_stores_decoded_content() {
        let memory = MemoryStorage::new().with_bucket("media");
        let connector = connector(RecordingStorage::new(memory.clone()), false);
        let request = UploadRequest::from_bytes("docs", "a.txt", b"hello world");

        let url = connector.save_file(&request, "text/plain").await.unwrap();
        assert_eq!(url, "https://media/docs%2Fa.txt");

        let object = connector.download("media", "docs/a.txt").await.unwrap();
        assert_eq!(object.data.len(), 11);
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_save_file_without_category_uses_file_name() {
        let memory = MemoryStorage::new().with_bucket("media");
        let connector = connector(RecordingStorage::new(memory.clone()), false);
        let request = UploadRequest::from_bytes("", "a.txt", b"hello");

        let url = connector.save_file(&request, "text/plain").await.unwrap();
        assert_eq!(url, "https://media/a.txt");
        assert_eq!(memory.keys("media"), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_save_file_rejects_bad_base64() {
        let storage = RecordingStorage::new(MemoryStorage::new().with_bucket("media"));
        let calls = storage.calls();
        let connector = connector(storage, false);
        let request = UploadRequest {
            file_name: "a.txt".into(),
            category: "docs".into(),
            raw_data: "not base64!".into(),
        };

        let err = connector.save_file(&request, "text/plain").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_write_file_acl() {
        let storage = RecordingStorage::new(MemoryStorage::new().with_bucket("media"));
        let calls = storage.calls();
        connector(storage.clone(), true)
            .write_file("a.bin", Bytes::from_static(b"\x00\x01"))
            .await
            .unwrap();
        connector(storage, false)
            .write_file("b.bin", Bytes::from_static(b"\x02"))
            .await
            .unwrap();

        assert_eq!(calls.all(), vec![
            Call::Put {
                key: "a.bin".into(),
                acl: Some(ObjectAcl::PublicRead),
            },
            Call::Put {
                key: "b.bin".into(),
                acl: None,
            },
        ]);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_key() {
        let connector = connector(RecordingStorage::new(MemoryStorage::new()), false);
        let err = connector
            .upload("media", "", Bytes::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket_fails() {
        let connector = connector(RecordingStorage::new(MemoryStorage::new()), false);
        let err = connector
            .upload("other", "a.txt", Bytes::from_static(b"x"), Some("text/plain"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientBackend);
    }
}
