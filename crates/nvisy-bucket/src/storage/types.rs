//! Request and response types exchanged with a [`StorageClient`].
//!
//! [`StorageClient`]: super::StorageClient

use bytes::Bytes;
use derive_more::{Deref, Display, From, Into};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

/// Opaque cursor returned by a paginated listing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Deref, Display, From, Into)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One batch of object keys returned by a listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    /// Keys in listing order.
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` on the final page.
    pub next: Option<ContinuationToken>,
}

impl ObjectPage {
    /// Creates a page from its keys and continuation token.
    pub fn new(keys: Vec<String>, next: Option<ContinuationToken>) -> Self {
        Self { keys, next }
    }

    /// Returns whether this is the final page.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Bucket returned by a bucket enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created, if the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl BucketInfo {
    /// Creates bucket info without a creation time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
        }
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Canned access control applied to a written object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(AsRefStr, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectAcl {
    /// Backend default, owner-only access.
    #[default]
    Private,
    /// Anyone can read the object.
    PublicRead,
}

/// A write request for a single object.
#[derive(Debug, Clone)]
pub struct PutObject {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Object content.
    pub body: Bytes,
    /// MIME type stored with the object.
    pub content_type: Option<String>,
    /// Canned ACL, `None` leaves the backend default.
    pub acl: Option<ObjectAcl>,
}

impl PutObject {
    /// Creates a write request with no content type and default ACL.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: Bytes) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_type: None,
            acl: None,
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the canned ACL.
    #[must_use]
    pub fn with_acl(mut self, acl: ObjectAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Content length in bytes.
    #[inline]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Downloaded object content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    /// Raw object bytes.
    pub data: Bytes,
    /// MIME type stored with the object, if any.
    pub content_type: Option<String>,
}
