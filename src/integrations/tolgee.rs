//! Tolgee translation management integration
//!
//! New keys created in the test environment are handed to Tolgee instead of
//! becoming local overrides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::types::Localisation;

const API_KEY_HEADER: &str = "X-API-Key";

/// Imports new translation keys into the translation management tool
#[async_trait]
pub trait KeyImporter: Send + Sync {
    /// Returns `false` when the tool declined the key
    async fn import_key(&self, localisation: &Localisation) -> Result<bool>;
}

/// Tolgee configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TolgeeConfig {
    pub base_url: String,
    pub api_key: String,
    pub project_id: String,
}

/// Tolgee REST client
pub struct TolgeeImporter {
    client: reqwest::Client,
    config: TolgeeConfig,
}

impl TolgeeImporter {
    pub fn new(config: TolgeeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn import_url(&self) -> String {
        format!(
            "{}/v2/projects/{}/keys/import-resolvable",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id
        )
    }
}

/// Request body importing a single key with one translation
pub fn import_body(localisation: &Localisation) -> serde_json::Value {
    json!({
        "keys": [{
            "name": localisation.key,
            "namespace": localisation.namespace,
            "translations": {
                localisation.locale.clone(): {
                    "text": localisation.value,
                    "resolution": "NEW"
                }
            }
        }]
    })
}

#[async_trait]
impl KeyImporter for TolgeeImporter {
    async fn import_key(&self, localisation: &Localisation) -> Result<bool> {
        let response = self
            .client
            .post(self.import_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&import_body(localisation))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "Localisation {:?} was not imported to Tolgee: ({}) {}",
                localisation,
                status,
                body
            );
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }
}

/// Importer used when no Tolgee instance is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledImporter;

#[async_trait]
impl KeyImporter for DisabledImporter {
    async fn import_key(&self, localisation: &Localisation) -> Result<bool> {
        tracing::debug!("Tolgee not configured, not importing {:?}", localisation);
        Ok(false)
    }
}
