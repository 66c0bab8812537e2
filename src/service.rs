//! Service facade tying the engines together for the API layer

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::integrations::KeyImporter;
use crate::resolution::ResolutionEngine;
use crate::serving::{CacheDirective, ConditionalCacheAdapter};
use crate::storage::{BaseStore, EvictionWorker, ObjectStore, OverrideStore};
use crate::sync::{PeerClient, SyncEngine};
use crate::types::{Environment, Localisation, MassUpdateResult, ServiceConfig, Status, UiConfig};

/// Everything a request handler needs
pub struct LokalisointiService {
    config: ServiceConfig,
    base: Arc<BaseStore>,
    resolution: ResolutionEngine,
    sync: SyncEngine,
    serving: ConditionalCacheAdapter,
    importer: Arc<dyn KeyImporter>,
}

impl LokalisointiService {
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn ObjectStore>,
        overrides: OverrideStore,
        peer: Arc<dyn PeerClient>,
        importer: Arc<dyn KeyImporter>,
    ) -> Self {
        let base = Arc::new(BaseStore::new(store, &config.base_store));
        Self::with_base_store(config, base, overrides, peer, importer)
    }

    pub fn with_base_store(
        config: ServiceConfig,
        base: Arc<BaseStore>,
        overrides: OverrideStore,
        peer: Arc<dyn PeerClient>,
        importer: Arc<dyn KeyImporter>,
    ) -> Self {
        Self {
            resolution: ResolutionEngine::new(base.clone(), overrides),
            sync: SyncEngine::new(base.clone(), peer, config.env_name),
            serving: ConditionalCacheAdapter::new(base.clone(), config.public_cache_max_age()),
            base,
            importer,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn base(&self) -> &Arc<BaseStore> {
        &self.base
    }

    pub fn resolution(&self) -> &ResolutionEngine {
        &self.resolution
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn serving(&self) -> &ConditionalCacheAdapter {
        &self.serving
    }

    /// Start the periodic listing cache eviction
    pub fn start_cache_eviction(&self) -> EvictionWorker {
        self.base.start_eviction()
    }

    /// Directive for query answers; `cache == false` opts out
    pub fn query_cache_directive(&self, cache: bool) -> CacheDirective {
        if cache {
            CacheDirective::Public(self.config.public_cache_max_age())
        } else {
            CacheDirective::NoCache
        }
    }

    /// Create or update a batch of localisations.
    ///
    /// Localisations with an id update that override (or recreate it when it
    /// is gone). New localisations go to the translation management tool in
    /// the test environment and become overrides everywhere else.
    pub async fn update_localisations(
        &self,
        batch: &[Localisation],
        user: &str,
    ) -> Result<MassUpdateResult> {
        let mut result = MassUpdateResult {
            status: Status::ok().status,
            ..Default::default()
        };

        for localisation in batch {
            if let Some(id) = localisation.id {
                match self.resolution.overrides().find_by_id(id)? {
                    Some(existing) if existing.same_content(localisation) => {
                        tracing::info!("Localisation not changed - not updating: {:?}", localisation);
                        result.not_modified += 1;
                    }
                    Some(_) => {
                        tracing::info!("Updating localisation: {:?}", localisation);
                        self.resolution.update_override(id, localisation, user)?;
                        result.updated += 1;
                    }
                    None => {
                        tracing::info!(
                            "Existing not found, creating new localisation override: {:?}",
                            localisation
                        );
                        self.resolution.save_override(localisation, user)?;
                        result.created += 1;
                    }
                }
            } else if self.config.env_name == Environment::Pallero {
                if self.importer.import_key(localisation).await? {
                    tracing::info!("Imported localisation to Tolgee: {:?}", localisation);
                    result.created += 1;
                } else {
                    tracing::info!("Bypassed localisation import to Tolgee: {:?}", localisation);
                    result.not_modified += 1;
                }
            } else {
                tracing::info!("Creating new localisation override: {:?}", localisation);
                self.resolution.save_override(localisation, user)?;
                result.created += 1;
            }
        }

        Ok(result)
    }

    /// Namespaces offered when creating overrides: base namespaces plus override namespaces
    pub async fn override_namespaces(&self) -> Result<BTreeSet<String>> {
        let mut namespaces = self.sync.available_namespaces(None).await?;
        namespaces.extend(self.resolution.overrides().available_namespaces()?);
        Ok(namespaces)
    }

    pub fn ui_config(&self) -> UiConfig {
        UiConfig::for_environment(self.config.env_name)
    }
}
