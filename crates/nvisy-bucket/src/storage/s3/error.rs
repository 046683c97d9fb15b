//! Classification of SDK errors into crate error kinds.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::{Error, ErrorKind};

/// Service error codes that mean the object does not exist.
///
/// `NoSuchKey` comes from object reads and deletes, `NotFound` from HEAD-style
/// responses without a body. Both are treated the same.
const NOT_FOUND_CODES: [&str; 2] = ["NoSuchKey", "NotFound"];

/// Converts an SDK error into a crate [`Error`], keeping it as the source.
pub(super) fn from_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::TimeoutError(_) => ErrorKind::Timeout,
        SdkError::ServiceError(context) => classify_code(context.err().code()),
        _ => ErrorKind::TransientBackend,
    };

    let message = format!("{operation} failed: {}", DisplayErrorContext(&err));
    Error::from_source(kind, err).with_message(message)
}

/// Maps an S3 service error code to an error kind.
pub(super) fn classify_code(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorKind::NotFound,
        _ => ErrorKind::TransientBackend,
    }
}
