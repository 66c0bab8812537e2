//! Base translation catalog on top of an object store
//!
//! Adds the tag listing cache, bounded retries and JSON parsing of
//! translation files to the raw [`ObjectStore`] operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::listing_cache::{EvictionWorker, Listing, ListingCache};
use super::object_key::{ObjectKey, ObjectKeyCodec};
use super::object_store::{Conditional, Conditions, ObjectStore, StoredObject};
use super::retry::RetryPolicy;
use crate::error::{LokalisointiError, Result};
use crate::types::{BaseStoreConfig, ObjectMetadata};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A parsed base translation file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFile {
    pub key: ObjectKey,
    pub translations: BTreeMap<String, String>,
}

/// Parse the content of a base translation file
pub fn parse_translations(object_key: &str, content: &[u8]) -> Result<BTreeMap<String, String>> {
    serde_json::from_slice(content).map_err(|e| {
        LokalisointiError::Parse(format!("translation file '{}': {}", object_key, e))
    })
}

/// Object-store backed catalog of base translation files
pub struct BaseStore {
    store: Arc<dyn ObjectStore>,
    codec: ObjectKeyCodec,
    slug: String,
    cache: Arc<ListingCache>,
    retry: RetryPolicy,
}

impl BaseStore {
    pub fn new(store: Arc<dyn ObjectStore>, config: &BaseStoreConfig) -> Self {
        Self {
            store,
            codec: ObjectKeyCodec::new(config.tag.clone()),
            slug: config.slug.clone(),
            cache: Arc::new(ListingCache::new(config.find_cache_ttl())),
            retry: RetryPolicy::new(
                config.retry_attempts,
                std::time::Duration::from_millis(config.retry_backoff_ms),
            ),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn codec(&self) -> &ObjectKeyCodec {
        &self.codec
    }

    /// Tag of this application's objects
    pub fn tag(&self) -> &str {
        self.codec.tag()
    }

    /// Export slug of this environment
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn cache(&self) -> &Arc<ListingCache> {
        &self.cache
    }

    /// Start the periodic full eviction of the listing cache
    pub fn start_eviction(&self) -> EvictionWorker {
        EvictionWorker::start(self.cache.clone(), self.cache.ttl())
    }

    /// List every object carrying `tag`, served from the listing cache when possible
    pub async fn find(&self, tag: &str) -> Result<Listing> {
        self.cache
            .get_or_populate(tag, || self.find_uncached(tag))
            .await
    }

    /// List every object carrying `tag` straight from the store
    pub async fn find_uncached(&self, tag: &str) -> Result<Vec<ObjectMetadata>> {
        let prefix = format!("t-{}/", tag);
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("list objects", || self.store.list_page(&prefix, token.clone()))
                .await?;
            objects.extend(page.objects);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!("Listed {} objects with tag {}", objects.len(), tag);
        Ok(objects)
    }

    /// Fetch one object; `None` when the key does not exist
    pub async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.retry.run("get object", || self.store.get(key)).await?)
    }

    pub async fn get_conditional(&self, key: &str, conditions: &Conditions) -> Result<Conditional> {
        Ok(self
            .retry
            .run("get object", || self.store.get_conditional(key, conditions))
            .await?)
    }

    /// Metadata only; `None` when the key does not exist
    pub async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>> {
        Ok(self.retry.run("head object", || self.store.head(key)).await?)
    }

    pub async fn put(&self, key: &str, content: Vec<u8>, content_type: &str) -> Result<()> {
        self.retry
            .run("put object", || self.store.put(key, content.clone(), content_type))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.retry
            .run("delete object", || self.store.delete(key))
            .await?;
        Ok(())
    }

    /// Fetch and parse a translation file; `None` when it vanished after listing
    pub async fn read_file(&self, metadata: &ObjectMetadata) -> Result<Option<TranslationFile>> {
        let key = self.codec.decode(&metadata.key)?;
        let Some(object) = self.get(&metadata.key).await? else {
            tracing::warn!("Listed object {} no longer exists", metadata.key);
            return Ok(None);
        };
        let translations = parse_translations(&metadata.key, &object.content)?;
        Ok(Some(TranslationFile { key, translations }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MemoryObjectStore;

    fn setup(page_size: usize) -> (Arc<MemoryObjectStore>, BaseStore) {
        let store = Arc::new(MemoryObjectStore::with_page_size(page_size));
        let base = BaseStore::new(store.clone(), &BaseStoreConfig::new("slug"))
            .with_retry_policy(RetryPolicy::immediate(3));
        (store, base)
    }

    #[tokio::test]
    async fn test_find_paginates_until_exhausted() {
        let (store, base) = setup(2);
        for i in 0..5 {
            store.insert(&format!("t-lokalisointi/slug/ns{}/fi.json", i), "{}");
        }
        store.insert("t-muu/slug/fi.json", "{}");

        let objects = base.find_uncached("lokalisointi").await.unwrap();
        assert_eq!(objects.len(), 5);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_find_is_cached_until_invalidated() {
        let (store, base) = setup(100);
        store.insert("t-lokalisointi/slug/fi.json", "{}");

        base.find("lokalisointi").await.unwrap();
        base.find("lokalisointi").await.unwrap();
        assert_eq!(store.list_calls(), 1);

        store.insert("t-lokalisointi/slug/sv.json", "{}");
        assert_eq!(base.find("lokalisointi").await.unwrap().len(), 1);

        base.cache().invalidate_all();
        assert_eq!(base.find("lokalisointi").await.unwrap().len(), 2);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_retryable_failures_are_retried() {
        let (store, base) = setup(100);
        store.insert("t-lokalisointi/slug/fi.json", r#"{"a":"b"}"#);
        store.inject_failure(StoreError::Retryable("reset".into()));
        store.inject_failure(StoreError::Retryable("reset".into()));

        let object = base.get("t-lokalisointi/slug/fi.json").await.unwrap();
        assert!(object.is_some());
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let (store, base) = setup(100);
        for _ in 0..3 {
            store.inject_failure(StoreError::Retryable("reset".into()));
        }

        let err = base.get("t-lokalisointi/slug/fi.json").await.unwrap_err();
        assert!(matches!(err, LokalisointiError::ObjectStore(StoreError::Fatal(_))));
    }

    #[tokio::test]
    async fn test_fatal_failure_propagates_immediately() {
        let (store, base) = setup(100);
        store.insert("t-lokalisointi/slug/fi.json", "{}");
        store.inject_failure(StoreError::Fatal("forbidden".into()));

        assert!(base.head("t-lokalisointi/slug/fi.json").await.is_err());
        // Only one failure was consumed; the next call succeeds
        assert!(base.head("t-lokalisointi/slug/fi.json").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_an_error() {
        let (_store, base) = setup(100);
        assert_eq!(base.get("t-lokalisointi/slug/xx.json").await.unwrap(), None);
        assert_eq!(
            base.get_conditional("t-lokalisointi/slug/xx.json", &Conditions::default())
                .await
                .unwrap(),
            Conditional::NotFound
        );
    }

    #[tokio::test]
    async fn test_read_file_parses_translations() {
        let (store, base) = setup(100);
        store.insert(
            "t-lokalisointi/slug/example/fi.json",
            r#"{"greet":"Hei","bye":"Hei hei"}"#,
        );
        let listing = base.find("lokalisointi").await.unwrap();

        let file = base.read_file(&listing[0]).await.unwrap().unwrap();
        assert_eq!(file.key.namespace.as_deref(), Some("example"));
        assert_eq!(file.translations.get("greet").map(String::as_str), Some("Hei"));
    }

    #[tokio::test]
    async fn test_read_file_rejects_malformed_json() {
        let (store, base) = setup(100);
        store.insert("t-lokalisointi/slug/fi.json", "not json");
        let listing = base.find("lokalisointi").await.unwrap();

        assert!(matches!(
            base.read_file(&listing[0]).await,
            Err(LokalisointiError::Parse(_))
        ));
    }
}
