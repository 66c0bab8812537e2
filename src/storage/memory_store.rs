//! In-process object store for tests and local development

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use super::object_store::{Conditional, Conditions, ListPage, ObjectStore, StoredObject};
use crate::error::StoreError;
use crate::types::ObjectMetadata;

/// Object store kept in memory, with S3-like listing and conditional semantics
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    /// Errors returned by the next calls, in order
    injected: Mutex<VecDeque<StoreError>>,
    /// Puts still allowed before every further put fails
    put_failure: Mutex<Option<(u64, StoreError)>>,
    list_calls: AtomicU64,
    get_calls: AtomicU64,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            injected: Mutex::new(VecDeque::new()),
            put_failure: Mutex::new(None),
            list_calls: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
        }
    }

    /// Make the next call fail with `error`
    pub fn inject_failure(&self, error: StoreError) {
        self.injected.lock().push_back(error);
    }

    /// Let `successes` more puts through, then fail every put with `error`
    pub fn fail_put_after(&self, successes: u64, error: StoreError) {
        *self.put_failure.lock() = Some((successes, error));
    }

    /// Number of `list_page` calls served
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `get`/`get_conditional` calls served
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Insert an object directly, bypassing failure injection
    pub fn insert(&self, key: &str, content: impl Into<Vec<u8>>) {
        let content = content.into();
        let object = StoredObject {
            metadata: metadata_for(key, &content),
            content,
            content_type: Some("application/json".to_string()),
        };
        self.objects.write().insert(key.to_string(), object);
    }

    fn take_injected(&self) -> Result<(), StoreError> {
        match self.injected.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_for(key: &str, content: &[u8]) -> ObjectMetadata {
    let digest = hex::encode(Sha256::digest(content));
    let tags: BTreeSet<String> = key
        .split('/')
        .next()
        .and_then(|first| first.strip_prefix("t-"))
        .map(|tag| BTreeSet::from([tag.to_string()]))
        .unwrap_or_default();

    ObjectMetadata {
        key: key.to_string(),
        tags,
        last_modified: Utc::now(),
        size: content.len() as u64,
        etag: format!("\"{}\"", &digest[..32]),
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StoreError> {
        self.take_injected()?;
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        let objects = self.objects.read();
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| token.as_deref().map_or(true, |t| key.as_str() > t))
            .map(|(_, object)| object.metadata.clone());

        let page: Vec<ObjectMetadata> = matching.by_ref().take(self.page_size).collect();
        let next_token = match matching.next() {
            Some(_) => page.last().map(|m| m.key.clone()),
            None => None,
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        self.take_injected()?;
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.objects.read().get(key).cloned())
    }

    async fn get_conditional(
        &self,
        key: &str,
        conditions: &Conditions,
    ) -> Result<Conditional, StoreError> {
        self.take_injected()?;
        self.get_calls.fetch_add(1, Ordering::Relaxed);

        Ok(match self.objects.read().get(key) {
            None => Conditional::NotFound,
            Some(object) if conditions.not_modified(&object.metadata) => {
                Conditional::NotModified(object.metadata.clone())
            }
            Some(object) => Conditional::Fresh(object.clone()),
        })
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StoreError> {
        self.take_injected()?;
        Ok(self.objects.read().get(key).map(|o| o.metadata.clone()))
    }

    async fn put(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.take_injected()?;
        if let Some((remaining, error)) = self.put_failure.lock().as_mut() {
            if *remaining == 0 {
                return Err(error.clone());
            }
            *remaining -= 1;
        }
        let object = StoredObject {
            metadata: metadata_for(key, &content),
            content,
            content_type: Some(content_type.to_string()),
        };
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.take_injected()?;
        self.objects.write().remove(key);
        Ok(())
    }
}
