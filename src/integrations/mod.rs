//! External integrations
//!
//! Currently supported:
//! - Tolgee key import

pub mod tolgee;

pub use tolgee::{DisabledImporter, KeyImporter, TolgeeConfig, TolgeeImporter};
