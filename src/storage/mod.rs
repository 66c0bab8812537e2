//! Storage layer for Lokalisointi
//!
//! Base translations live in an object store behind [`BaseStore`]; manual
//! overrides live in SQLite behind [`OverrideStore`].

mod base_store;
mod connection;
mod listing_cache;
mod memory_store;
mod migrations;
pub mod object_key;
mod object_store;
pub mod overrides;
mod retry;
#[cfg(feature = "cloud")]
mod s3;

pub use base_store::{parse_translations, BaseStore, TranslationFile, JSON_CONTENT_TYPE};
pub use connection::Storage;
pub use listing_cache::{CacheStatsResponse, EvictionWorker, Listing, ListingCache};
pub use memory_store::MemoryObjectStore;
pub use migrations::SCHEMA_VERSION;
pub use object_key::{ObjectKey, ObjectKeyCodec};
pub use object_store::{
    etag_matches, Conditional, Conditions, ListPage, ObjectStore, StoredObject,
};
pub use overrides::OverrideStore;
pub use retry::RetryPolicy;
#[cfg(feature = "cloud")]
pub use s3::{S3Config, S3ObjectStore};
