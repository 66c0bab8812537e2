//! Lokalisointi - localisation service
//!
//! Base translations are JSON files in an object store, published by a
//! translation management tool. Environments overlay them with locally
//! stored overrides and can copy base files from one another.

pub mod api;
pub mod error;
pub mod integrations;
pub mod resolution;
pub mod service;
pub mod serving;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{LokalisointiError, Result};
pub use resolution::{QueryParams, ResolutionEngine};
pub use service::LokalisointiService;
pub use serving::{ConditionalCacheAdapter, FileResponse};
pub use storage::{BaseStore, OverrideStore};
pub use sync::{CopyReport, SyncEngine};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
