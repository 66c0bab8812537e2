//! Cross-environment synchronization of base translations
//!
//! An environment exports its base files as a zip archive; another
//! environment pulls that archive and writes the files under its own slug.
//! A copy runs in two phases: every archive entry is written, then (for a
//! full copy only) keys the source no longer has are deleted. Nothing is
//! rolled back when a phase fails.

mod archive;
mod peer;

pub use archive::{read_archive, write_archive, ArchiveEntry};
pub use peer::{
    namespace_query, HttpPeerClient, PeerClient, AVAILABLE_NAMESPACES_PATH,
    LOCALISATION_FILES_PATH,
};

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{BaseStore, JSON_CONTENT_TYPE};
use crate::types::{CopyRequest, Environment, Status};

/// What a copy did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReport {
    /// Keys written in the first phase
    pub written: Vec<String>,
    /// Keys deleted while reconciling a full copy
    pub deleted: Vec<String>,
    /// Whether reconciliation ran
    pub reconciled: bool,
    /// The request named the current environment as source and was ignored
    pub self_copy: bool,
}

/// Export and import of base translation archives
pub struct SyncEngine {
    base: Arc<BaseStore>,
    peer: Arc<dyn PeerClient>,
    current: Environment,
}

impl SyncEngine {
    pub fn new(base: Arc<BaseStore>, peer: Arc<dyn PeerClient>, current: Environment) -> Self {
        Self {
            base,
            peer,
            current,
        }
    }

    pub fn current_environment(&self) -> Environment {
        self.current
    }

    /// Zip archive of the base files, restricted to `namespaces` when non-empty
    pub async fn export_archive(&self, namespaces: Option<&[String]>) -> Result<Vec<u8>> {
        let scope = namespaces.filter(|n| !n.is_empty());
        let listing = self.base.find(self.base.tag()).await?;

        let mut selected = Vec::new();
        for metadata in listing.iter() {
            let key = self.base.codec().decode(&metadata.key)?;
            let included = match scope {
                Some(wanted) => key
                    .namespace
                    .as_ref()
                    .map_or(false, |ns| wanted.contains(ns)),
                None => true,
            };
            if included {
                selected.push((metadata.key.as_str(), key));
            }
        }

        let fetched = try_join_all(selected.into_iter().map(|(object_key, key)| async move {
            let object = self.base.get(object_key).await?;
            if object.is_none() {
                tracing::warn!("Listed object {} no longer exists, not exported", object_key);
            }
            Ok::<_, crate::error::LokalisointiError>(object.map(|o| ArchiveEntry {
                namespace: key.namespace,
                locale: key.locale,
                content: o.content,
            }))
        }))
        .await?;

        let entries: Vec<ArchiveEntry> = fetched.into_iter().flatten().collect();
        tracing::info!(
            "Exporting {} localisation files (namespaces: {:?})",
            entries.len(),
            scope
        );
        write_archive(entries)
    }

    /// Copy base files from another environment
    pub async fn copy_from(&self, request: &CopyRequest) -> Result<CopyReport> {
        if request.source == self.current {
            tracing::info!(
                "Trying to copy localisations from current environment ({}) - aborting",
                self.current
            );
            return Ok(CopyReport {
                self_copy: true,
                ..Default::default()
            });
        }

        let scope = request.scope();
        tracing::info!(
            "Copying localisations from {}, namespaces: {:?}",
            request.source,
            scope
        );

        let archive = self.peer.fetch_archive(request.source, scope).await?;
        let entries = read_archive(&archive)?;

        let mut report = CopyReport::default();
        let outcome = self.write_phase(entries, &mut report).await;
        let outcome = match outcome {
            Ok(()) if scope.is_none() => self.reconcile_phase(&mut report).await,
            other => other,
        };
        // Partial writes stay in place, so the listing is stale either way
        self.base.cache().invalidate_all();
        outcome?;

        tracing::info!(
            "Copied {} localisation files from {}, deleted {}",
            report.written.len(),
            request.source,
            report.deleted.len()
        );
        Ok(report)
    }

    /// Copy and fold the outcome into a coarse status
    pub async fn copy_status(&self, request: &CopyRequest) -> Status {
        match self.copy_from(request).await {
            Ok(_) => Status::ok(),
            Err(e) => {
                tracing::error!("Copying localisations from {} failed: {}", request.source, e);
                Status::failed()
            }
        }
    }

    async fn write_phase(&self, entries: Vec<ArchiveEntry>, report: &mut CopyReport) -> Result<()> {
        for entry in entries {
            let key = self.base.codec().encode(
                self.base.slug(),
                entry.namespace.as_deref(),
                &entry.locale,
            );
            tracing::info!("Writing localisation file {} to {}", entry.path(), key);
            self.base.put(&key, entry.content, JSON_CONTENT_TYPE).await?;
            report.written.push(key);
        }
        Ok(())
    }

    async fn reconcile_phase(&self, report: &mut CopyReport) -> Result<()> {
        report.reconciled = true;
        let written: BTreeSet<&str> = report.written.iter().map(String::as_str).collect();
        let existing = self.base.find_uncached(self.base.tag()).await?;

        let stale: Vec<String> = existing
            .into_iter()
            .map(|m| m.key)
            .filter(|key| !written.contains(key.as_str()))
            .collect();

        for key in stale {
            tracing::info!("Deleting localisation file {}", key);
            self.base.delete(&key).await?;
            report.deleted.push(key);
        }
        Ok(())
    }

    /// Namespaces of the local base files, or those reported by `source`
    pub async fn available_namespaces(
        &self,
        source: Option<Environment>,
    ) -> Result<BTreeSet<String>> {
        match source {
            Some(source) => self.peer.available_namespaces(source).await,
            None => self.local_namespaces().await,
        }
    }

    async fn local_namespaces(&self) -> Result<BTreeSet<String>> {
        let listing = self.base.find(self.base.tag()).await?;
        let mut namespaces = BTreeSet::new();
        for metadata in listing.iter() {
            if let Some(ns) = self.base.codec().decode(&metadata.key)?.namespace {
                namespaces.insert(ns);
            }
        }
        Ok(namespaces)
    }
}
