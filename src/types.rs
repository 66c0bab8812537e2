//! Core types for Lokalisointi

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LokalisointiError, Result};

/// Unique identifier of a localisation override row
pub type OverrideId = i64;

/// Tag marking this application's objects inside a shared bucket
pub const DEFAULT_TAG: &str = "lokalisointi";

/// A single translation, either straight from a base file or after override resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "LocalisationInput", into = "LocalisationWire")]
pub struct Localisation {
    /// Override id when an override participated, `None` for base translations
    pub id: Option<OverrideId>,
    /// Namespace (a.k.a. category); `None` for root files of an export
    pub namespace: Option<String>,
    pub key: String,
    pub locale: String,
    pub value: String,
}

/// Outgoing shape of a localisation; `category` is the legacy alias for `namespace`
#[derive(Serialize)]
struct LocalisationWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<OverrideId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    key: String,
    locale: String,
    value: String,
}

/// Incoming shape of a localisation; `namespace` wins over `category` when both are sent
#[derive(Deserialize)]
struct LocalisationInput {
    #[serde(default)]
    id: Option<OverrideId>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    category: Option<String>,
    key: String,
    locale: String,
    value: String,
}

impl From<LocalisationInput> for Localisation {
    fn from(input: LocalisationInput) -> Self {
        Self {
            id: input.id,
            namespace: input.namespace.or(input.category),
            key: input.key,
            locale: input.locale,
            value: input.value,
        }
    }
}

impl From<Localisation> for LocalisationWire {
    fn from(l: Localisation) -> Self {
        Self {
            id: l.id,
            category: l.namespace.clone(),
            namespace: l.namespace,
            key: l.key,
            locale: l.locale,
            value: l.value,
        }
    }
}

impl Localisation {
    /// Base translation (no override participated)
    pub fn base(
        namespace: Option<String>,
        key: impl Into<String>,
        locale: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            namespace,
            key: key.into(),
            locale: locale.into(),
            value: value.into(),
        }
    }

    /// Identity of this translation in the merged result set
    pub fn triple(&self) -> TranslationKey {
        TranslationKey {
            namespace: self.namespace.clone(),
            locale: self.locale.clone(),
            key: self.key.clone(),
        }
    }
}

/// The (namespace, locale, key) triple identifying a translation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TranslationKey {
    pub namespace: Option<String>,
    pub locale: String,
    pub key: String,
}

/// A persisted manual override of a translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalisationOverride {
    pub id: OverrideId,
    pub namespace: Option<String>,
    pub locale: String,
    pub key: String,
    pub value: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub updated_by: String,
    pub updated: DateTime<Utc>,
}

impl LocalisationOverride {
    pub fn to_localisation(&self) -> Localisation {
        Localisation {
            id: Some(self.id),
            namespace: self.namespace.clone(),
            key: self.key.clone(),
            locale: self.locale.clone(),
            value: self.value.clone(),
        }
    }

    pub fn triple(&self) -> TranslationKey {
        TranslationKey {
            namespace: self.namespace.clone(),
            locale: self.locale.clone(),
            key: self.key.clone(),
        }
    }

    /// True when the override already carries exactly this content
    pub fn same_content(&self, l: &Localisation) -> bool {
        self.namespace == l.namespace
            && self.key == l.key
            && self.locale == l.locale
            && self.value == l.value
    }
}

/// Descriptor of a stored base-translation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub tags: BTreeSet<String>,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    pub etag: String,
}

/// Environments taking part in localisation copying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Pallero,
    Untuva,
    Hahtuva,
    Sade,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Pallero,
        Environment::Untuva,
        Environment::Hahtuva,
        Environment::Sade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Pallero => "pallero",
            Environment::Untuva => "untuva",
            Environment::Hahtuva => "hahtuva",
            Environment::Sade => "sade",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pallero" => Ok(Environment::Pallero),
            "untuva" => Ok(Environment::Untuva),
            "hahtuva" => Ok(Environment::Hahtuva),
            "sade" => Ok(Environment::Sade),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

/// Base URL of every peer environment; the single place environments are mapped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentUrls {
    pub pallero: Option<String>,
    pub untuva: Option<String>,
    pub hahtuva: Option<String>,
    pub sade: Option<String>,
}

impl EnvironmentUrls {
    pub fn base_url(&self, env: Environment) -> Result<&str> {
        let url = match env {
            Environment::Pallero => self.pallero.as_deref(),
            Environment::Untuva => self.untuva.as_deref(),
            Environment::Hahtuva => self.hahtuva.as_deref(),
            Environment::Sade => self.sade.as_deref(),
        };
        url.map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| LokalisointiError::Config(format!("No base URL configured for {}", env)))
    }
}

/// Request to copy localisation files from another environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub source: Environment,
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,
}

impl CopyRequest {
    /// Namespace scope of the copy; an empty list means a full copy
    pub fn scope(&self) -> Option<&[String]> {
        self.namespaces.as_deref().filter(|n| !n.is_empty())
    }
}

/// Coarse-grained operation status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: "FAILED".to_string(),
        }
    }
}

/// Outcome counters of a mass update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassUpdateResult {
    pub not_modified: u32,
    pub created: u32,
    pub updated: u32,
    pub status: String,
}

/// Configuration consumed by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub source_environments: Vec<Environment>,
    pub current_environment: Environment,
}

impl UiConfig {
    pub fn for_environment(current: Environment) -> Self {
        Self {
            source_environments: Environment::ALL
                .into_iter()
                .filter(|e| *e != current)
                .collect(),
            current_environment: current,
        }
    }
}

/// Base store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStoreConfig {
    /// Tag selecting this application's objects
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Export slug of this environment
    pub slug: String,
    /// Listing cache lifetime; also the eviction period
    #[serde(default = "default_find_cache_ttl_ms")]
    pub find_cache_ttl_ms: u64,
    /// Attempts per object store call for retryable failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Delay before the first retry, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl BaseStoreConfig {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            tag: default_tag(),
            slug: slug.into(),
            find_cache_ttl_ms: default_find_cache_ttl_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    pub fn find_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.find_cache_ttl_ms)
    }
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_find_cache_ttl_ms() -> u64 {
    60_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// Service-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Environment this instance runs in
    pub env_name: Environment,
    pub base_store: BaseStoreConfig,
    #[serde(default)]
    pub environment_urls: EnvironmentUrls,
    /// `max-age` of publicly cacheable responses, in minutes
    #[serde(default = "default_public_cache_max_age")]
    pub public_cache_max_age_minutes: u64,
}

impl ServiceConfig {
    pub fn public_cache_max_age(&self) -> Duration {
        Duration::from_secs(self.public_cache_max_age_minutes * 60)
    }
}

fn default_public_cache_max_age() -> u64 {
    5
}
