//! S3-compatible object store backend

use std::collections::BTreeSet;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::object_store::{Conditional, Conditions, ListPage, ObjectStore, StoredObject};
use crate::error::StoreError;
use crate::types::ObjectMetadata;

/// Location of the bucket holding the translation files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (path-style addressing)
    pub endpoint_url: Option<String>,
}

/// Object store backed by an S3 bucket
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS configuration
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref region) = config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(S3Client::from_conf(builder.build()), config.bucket.clone())
    }

    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

fn to_chrono(dt: Option<&AwsDateTime>) -> DateTime<Utc> {
    dt.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
        .unwrap_or_default()
}

fn tags_of(key: &str) -> BTreeSet<String> {
    key.split('/')
        .next()
        .and_then(|first| first.strip_prefix("t-"))
        .map(|tag| BTreeSet::from([tag.to_string()]))
        .unwrap_or_default()
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

/// Split SDK failures into transient and permanent ones
fn classify<E>(operation: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(_) => {
            matches!(status_of(&err), Some(status) if status >= 500 || status == 429)
        }
        _ => false,
    };
    let message = format!("{}: {}", operation, DisplayErrorContext(&err));
    if retryable {
        StoreError::Retryable(message)
    } else {
        StoreError::Fatal(message)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| classify("list objects", e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(ObjectMetadata {
                    tags: tags_of(&key),
                    last_modified: to_chrono(object.last_modified()),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    etag: object.e_tag().unwrap_or_default().to_string(),
                    key,
                })
            })
            .collect();

        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        match self.get_conditional(key, &Conditions::default()).await? {
            Conditional::Fresh(object) => Ok(Some(object)),
            Conditional::NotFound => Ok(None),
            Conditional::NotModified(_) => Err(StoreError::Fatal(format!(
                "unconditional get of {} answered 304",
                key
            ))),
        }
    }

    async fn get_conditional(
        &self,
        key: &str,
        conditions: &Conditions,
    ) -> Result<Conditional, StoreError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_if_none_match(conditions.if_none_match.clone())
            .set_if_modified_since(
                conditions
                    .if_modified_since
                    .map(|since| AwsDateTime::from_secs(since.timestamp())),
            )
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let no_such_key = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                return match status_of(&err) {
                    _ if no_such_key => Ok(Conditional::NotFound),
                    Some(404) => Ok(Conditional::NotFound),
                    Some(304) => match self.head(key).await? {
                        Some(metadata) => Ok(Conditional::NotModified(metadata)),
                        None => Ok(Conditional::NotFound),
                    },
                    _ => Err(classify("get object", err)),
                };
            }
        };

        let metadata = ObjectMetadata {
            key: key.to_string(),
            tags: tags_of(key),
            last_modified: to_chrono(output.last_modified()),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            etag: output.e_tag().unwrap_or_default().to_string(),
        };
        let content_type = output.content_type().map(String::from);
        let content = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Retryable(format!("read body of {}: {}", key, e)))?
            .into_bytes()
            .to_vec();

        Ok(Conditional::Fresh(StoredObject {
            content,
            metadata,
            content_type,
        }))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMetadata {
                key: key.to_string(),
                tags: tags_of(key),
                last_modified: to_chrono(output.last_modified()),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                etag: output.e_tag().unwrap_or_default().to_string(),
            })),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if not_found || status_of(&err) == Some(404) {
                    Ok(None)
                } else {
                    Err(classify("head object", err))
                }
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let size = content.len();
        let filename = key.rsplit('/').next().unwrap_or(key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_disposition(format!("attachment; filename={}", filename))
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| classify("put object", e))?;

        tracing::info!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("delete object", e))?;

        tracing::info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_from_key() {
        assert_eq!(
            tags_of("t-lokalisointi/slug/fi.json"),
            BTreeSet::from(["lokalisointi".to_string()])
        );
        assert!(tags_of("other/fi.json").is_empty());
    }

    #[test]
    fn test_timestamp_conversion() {
        let aws = AwsDateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(Some(&aws)).timestamp(), 1_700_000_000);
        assert_eq!(to_chrono(None).timestamp(), 0);
    }
}
