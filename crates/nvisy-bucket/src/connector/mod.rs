//! Caller-facing bucket connector.
//!
//! [`BucketConnector`] owns the storage client for one configuration scope and
//! exposes the operations applications use: bucket enumeration, uploads,
//! downloads, listing, and the two delete flavours.
//!
//! ## Lifecycle
//!
//! A connector is acquired with [`BucketConnector::open`] (or
//! [`BucketConnector::with_storage`] for a custom backend) and released with
//! [`BucketConnector::close`]. [`BucketConnector::scoped`] pairs the two
//! around an async closure so the release happens on every exit path.
//!
//! ## Deleting
//!
//! - [`BucketConnector::delete_object`] deletes one key and treats an already
//!   missing object as success.
//! - [`BucketConnector::delete_with_prefix`] lists keys page by page and
//!   deletes them sequentially, stopping at the first failure. The
//!   cancellation token is checked before every page.

mod bucket_connector;
mod deletion;
mod upload;

#[cfg(test)]
mod testing;

pub use bucket_connector::BucketConnector;
pub use upload::{UploadRequest, object_url};
