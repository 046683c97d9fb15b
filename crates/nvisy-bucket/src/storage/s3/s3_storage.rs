//! S3 storage client.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl};
use jiff::Timestamp;
use tracing::instrument;

use super::error::from_sdk_error;
use crate::storage::{
    BucketInfo, ContinuationToken, ObjectData, ObjectPage, PutObject, StorageClient,
};
use crate::config::MAX_PAGE_SIZE;
use crate::{BucketConfig, Error, ErrorKind, Result, TRACING_TARGET_STORAGE};

/// Region in which buckets are created without a location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Name reported by the static credentials provider.
const CREDENTIALS_PROVIDER: &str = "nvisy-bucket";

/// [`StorageClient`] backed by an `aws-sdk-s3` client.
///
/// Cheap to clone: the SDK client is reference counted internally.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    region: String,
    page_size: i32,
}

impl S3Storage {
    /// Builds an S3 client from the bucket configuration.
    ///
    /// Uses the configured static credentials when an access key is set and
    /// the default AWS provider chain otherwise. A custom endpoint switches to
    /// path-style addressing. No request is sent.
    #[instrument(skip(config), target = TRACING_TARGET_STORAGE, fields(region = %config.bucket_region))]
    pub async fn connect(config: &BucketConfig) -> Result<Self> {
        let region = Region::new(config.bucket_region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if config.has_static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                config.bucket_key.clone(),
                config.bucket_secret.clone(),
                config.session_token().map(str::to_owned),
                None,
                CREDENTIALS_PROVIDER,
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.bucket_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(
            target: TRACING_TARGET_STORAGE,
            region = %config.bucket_region,
            endpoint = ?config.bucket_endpoint,
            access_key = %config.access_key_masked(),
            static_credentials = config.has_static_credentials(),
            "S3 client initialized"
        );

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket_region.clone(),
            config.bucket_page_size,
        ))
    }

    /// Wraps an already configured SDK client.
    ///
    /// `page_size` is clamped to `1..=MAX_PAGE_SIZE`, since S3 answers
    /// `max-keys=0` with an empty page.
    pub fn from_client(client: Client, region: impl Into<String>, page_size: i32) -> Self {
        Self {
            client,
            region: region.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Returns the underlying SDK client.
    #[inline]
    pub fn as_inner(&self) -> &Client {
        &self.client
    }
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("region", &self.region)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl StorageClient for S3Storage {
    #[instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| from_sdk_error("ListBuckets", e))?;

        let buckets = output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                let mut info = BucketInfo::new(bucket.name()?);
                info.created_at = bucket
                    .creation_date()
                    .and_then(|date| Timestamp::from_second(date.secs()).ok());
                Some(info)
            })
            .collect();

        Ok(buckets)
    }

    #[instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if self.region != DEFAULT_S3_REGION {
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request
            .send()
            .await
            .map_err(|e| from_sdk_error("CreateBucket", e))?;
        Ok(())
    }

    #[instrument(skip(self, cursor), target = TRACING_TARGET_STORAGE, fields(has_cursor = cursor.is_some()))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ObjectPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(self.page_size)
            .set_continuation_token(cursor.map(|token| token.as_str().to_owned()));

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        let output = request
            .send()
            .await
            .map_err(|e| from_sdk_error("ListObjectsV2", e))?;

        let keys: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(str::to_owned)
            .collect();

        let next = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(ContinuationToken::new)
        } else {
            None
        };

        tracing::debug!(
            target: TRACING_TARGET_STORAGE,
            bucket = bucket,
            prefix = prefix,
            keys = keys.len(),
            has_more = next.is_some(),
            "Listed objects page"
        );

        Ok(ObjectPage::new(keys, next))
    }

    #[instrument(skip(self, request), target = TRACING_TARGET_STORAGE, fields(bucket = %request.bucket, key = %request.key, size = request.content_length()))]
    async fn put_object(&self, request: PutObject) -> Result<()> {
        let content_length = i64::try_from(request.content_length()).map_err(|e| {
            Error::from_source(ErrorKind::InvalidInput, e).with_message("Object is too large")
        })?;

        self.client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .content_length(content_length)
            .set_content_type(request.content_type)
            .set_acl(request.acl.map(|acl| ObjectCannedAcl::from(acl.as_ref())))
            .body(ByteStream::from(request.body))
            .send()
            .await
            .map_err(|e| from_sdk_error("PutObject", e))?;
        Ok(())
    }

    #[instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error("GetObject", e))?;

        let content_type = output.content_type().map(str::to_owned);
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| {
                Error::from_source(ErrorKind::TransientBackend, e)
                    .with_message("Failed to read object body")
            })?
            .into_bytes();

        Ok(ObjectData { data, content_type })
    }

    #[instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error("DeleteObject", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::BucketConnector;

    /// Serves one canned HTTP response per connection, in order, and returns
    /// the request lines it received.
    async fn serve(responses: Vec<String>) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();

                let mut head = Vec::new();
                let mut buf = [0u8; 4096];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "connection closed before request head");
                    head.extend_from_slice(&buf[..n]);
                }

                let head = String::from_utf8_lossy(&head);
                requests.push(head.lines().next().unwrap_or_default().to_owned());

                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (addr, handle)
    }

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn list_page(keys: &[&str], truncated: bool, next_token: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|key| format!("<Contents><Key>{key}</Key><Size>1</Size></Contents>"))
            .collect();
        let token = next_token
            .map(|token| format!("<NextContinuationToken>{token}</NextContinuationToken>"))
            .unwrap_or_default();
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>media</Name><KeyCount>{}</KeyCount><IsTruncated>{truncated}</IsTruncated>{token}{contents}</ListBucketResult>"#,
            keys.len()
        );
        response("200 OK", &body)
    }

    async fn storage(addr: SocketAddr, page_size: i32) -> S3Storage {
        let config = BucketConfig::new("media")
            .with_credentials("AKIAEXAMPLE", "secret")
            .with_endpoint(format!("http://{addr}"))
            .with_page_size(page_size);
        S3Storage::connect(&config).await.unwrap()
    }

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_S3_REGION))
            .build();
        Client::from_conf(config)
    }

    #[tokio::test]
    async fn test_connect_does_not_send_requests() {
        let config = BucketConfig::new("media")
            .with_credentials("AKIAEXAMPLE", "secret")
            .with_endpoint("http://localhost:9000");

        let storage = S3Storage::connect(&config).await.unwrap();
        let debug_str = format!("{storage:?}");

        assert!(debug_str.contains("S3Storage"));
        assert!(debug_str.contains(&config.bucket_region));
        assert!(!debug_str.contains("secret"));
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let storage = S3Storage::from_client(offline_client(), DEFAULT_S3_REGION, 0);
        assert_eq!(storage.page_size, 1);

        let storage = S3Storage::from_client(offline_client(), DEFAULT_S3_REGION, -5);
        assert_eq!(storage.page_size, 1);

        let storage = S3Storage::from_client(offline_client(), DEFAULT_S3_REGION, 5000);
        assert_eq!(storage.page_size, MAX_PAGE_SIZE);

        let storage = S3Storage::from_client(offline_client(), DEFAULT_S3_REGION, 2);
        assert_eq!(storage.page_size, 2);
    }

    #[tokio::test]
    async fn test_list_objects_follows_continuation_token() {
        let (addr, server) = serve(vec![
            list_page(&["logs/a", "logs/b"], true, Some("tok1")),
            list_page(&["logs/c"], false, Some("stale")),
        ])
        .await;
        let storage = storage(addr, 2).await;

        let first = storage.list_objects("media", "logs/", None).await.unwrap();
        assert_eq!(first.keys, vec!["logs/a", "logs/b"]);
        let cursor = first.next.unwrap();
        assert_eq!(cursor.as_str(), "tok1");

        let second = storage
            .list_objects("media", "logs/", Some(&cursor))
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["logs/c"]);
        assert!(second.next.is_none());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("GET /media?"), "{request}");
            assert!(request.contains("list-type=2"), "{request}");
            assert!(request.contains("max-keys=2"), "{request}");
            assert!(request.contains("prefix=logs%2F"), "{request}");
        }
        assert!(!requests[0].contains("continuation-token"));
        assert!(requests[1].contains("continuation-token=tok1"));
    }

    #[tokio::test]
    async fn test_list_objects_omits_empty_prefix_and_clamps_page_size() {
        let (addr, server) = serve(vec![list_page(&["a"], false, None)]).await;
        let storage = storage(addr, 0).await;

        let page = storage.list_objects("media", "", None).await.unwrap();
        assert_eq!(page.keys, vec!["a"]);
        assert!(page.next.is_none());

        let requests = server.await.unwrap();
        assert!(requests[0].contains("max-keys=1"), "{}", requests[0]);
        assert!(!requests[0].contains("prefix="), "{}", requests[0]);
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_not_found() {
        let (addr, server) = serve(vec![
            response("404 Not Found", ""),
            response("404 Not Found", ""),
        ])
        .await;
        let storage = storage(addr, 2).await;

        let err = storage.delete_object("media", "gone").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let connector = BucketConnector::with_storage("test", BucketConfig::new("media"), storage);
        connector.delete_object("media", "gone").await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("DELETE /media/gone"), "{}", requests[0]);
    }
}
