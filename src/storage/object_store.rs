//! Object store abstraction used by the base store

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::ObjectMetadata;

/// One page of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectMetadata>,
    /// Token for the next page, `None` when the listing is exhausted
    pub next_token: Option<String>,
}

/// A fetched object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub metadata: ObjectMetadata,
    pub content_type: Option<String>,
}

/// Validators for a conditional fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }

    /// Whether `metadata` satisfies the validators, i.e. the client copy is current.
    ///
    /// `If-None-Match` decides alone when present; `If-Modified-Since` is
    /// consulted only otherwise (RFC 7232 section 6).
    pub fn not_modified(&self, metadata: &ObjectMetadata) -> bool {
        if let Some(ref tags) = self.if_none_match {
            return etag_matches(tags, &metadata.etag);
        }
        match self.if_modified_since {
            // HTTP dates carry whole seconds only
            Some(since) => metadata.last_modified.timestamp() <= since.timestamp(),
            None => false,
        }
    }
}

/// Weak comparison of an `If-None-Match` header value against an ETag
pub fn etag_matches(header: &str, etag: &str) -> bool {
    let normalize = |t: &str| t.trim().trim_start_matches("W/").trim_matches('"').to_string();
    let current = normalize(etag);
    header
        .split(',')
        .any(|candidate| candidate.trim() == "*" || normalize(candidate) == current)
}

/// Result of a conditional fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    Fresh(StoredObject),
    NotModified(ObjectMetadata),
    NotFound,
}

/// Raw object store operations. Missing keys are reported as `None`/`NotFound`,
/// never as errors.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;

    async fn get_conditional(
        &self,
        key: &str,
        conditions: &Conditions,
    ) -> Result<Conditional, StoreError>;

    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StoreError>;

    async fn put(&self, key: &str, content: Vec<u8>, content_type: &str)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
