//! Resolution of base translations and overrides into query results

mod merge;

pub use merge::{index_overrides, merge, Filter};

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Deserialize;

use crate::error::{LokalisointiError, Result};
use crate::storage::{BaseStore, OverrideStore};
use crate::types::{Localisation, LocalisationOverride, OverrideId};

/// Message of the conflicting namespace/category validation error
pub const NAMESPACE_MISMATCH: &str =
    "category and namespace are both defined and but do not match";

/// Query parameters; `category` is the legacy alias of `namespace`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    pub id: Option<OverrideId>,
    pub category: Option<String>,
    pub namespace: Option<String>,
    pub locale: Option<String>,
    pub key: Option<String>,
}

impl QueryParams {
    /// Reject conflicting filters and fold the alias into a single filter
    pub fn validate(&self) -> Result<Filter> {
        let namespace = match (&self.namespace, &self.category) {
            (Some(ns), Some(category)) if ns != category => {
                return Err(LokalisointiError::Validation(NAMESPACE_MISMATCH.to_string()))
            }
            (Some(ns), _) => Some(ns.clone()),
            (None, category) => category.clone(),
        };
        Ok(Filter {
            namespace,
            locale: self.locale.clone(),
            key: self.key.clone(),
        })
    }
}

/// Merges the base catalog with the stored overrides
#[derive(Clone)]
pub struct ResolutionEngine {
    base: Arc<BaseStore>,
    overrides: OverrideStore,
}

impl ResolutionEngine {
    pub fn new(base: Arc<BaseStore>, overrides: OverrideStore) -> Self {
        Self { base, overrides }
    }

    pub fn base(&self) -> &Arc<BaseStore> {
        &self.base
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    /// Resolve localisations matching `params`.
    ///
    /// With an id only that override is returned and no merge happens.
    pub async fn query(&self, params: &QueryParams) -> Result<Vec<Localisation>> {
        let filter = params.validate()?;
        tracing::debug!(
            "Querying localisations: id={:?} namespace={:?} locale={:?} key={:?}",
            params.id,
            filter.namespace,
            filter.locale,
            filter.key
        );

        if let Some(id) = params.id {
            return self.get_by_id(id);
        }

        let base = self.base_translations(&filter).await?;
        let overrides: Vec<LocalisationOverride> = self
            .overrides
            .find_all()?
            .into_iter()
            .filter(|o| filter.matches_override(o))
            .collect();

        Ok(merge(base, &overrides))
    }

    /// Base translations matching `filter`, without overrides
    pub async fn base_translations(&self, filter: &Filter) -> Result<Vec<Localisation>> {
        let listing = self.base.find(self.base.tag()).await?;

        let mut wanted = Vec::new();
        for metadata in listing.iter() {
            let key = self.base.codec().decode(&metadata.key)?;
            if filter.matches_file(key.namespace.as_deref(), &key.locale) {
                wanted.push(metadata);
            }
        }

        let files = try_join_all(wanted.into_iter().map(|m| self.base.read_file(m))).await?;

        let mut localisations = Vec::new();
        for file in files.into_iter().flatten() {
            let namespace = file.key.namespace;
            let locale = file.key.locale;
            for (key, value) in file.translations {
                if filter.key.as_deref().map_or(true, |k| k == key) {
                    localisations.push(Localisation {
                        id: None,
                        namespace: namespace.clone(),
                        key,
                        locale: locale.clone(),
                        value,
                    });
                }
            }
        }
        Ok(localisations)
    }

    /// The override with `id` as a localisation; empty when absent
    pub fn get_by_id(&self, id: OverrideId) -> Result<Vec<Localisation>> {
        Ok(self
            .overrides
            .find_by_id(id)?
            .map(|o| o.to_localisation())
            .into_iter()
            .collect())
    }

    pub fn find_overrides(&self) -> Result<Vec<LocalisationOverride>> {
        self.overrides.find_all()
    }

    pub fn save_override(
        &self,
        localisation: &Localisation,
        user: &str,
    ) -> Result<LocalisationOverride> {
        self.overrides.insert(localisation, user)
    }

    pub fn update_override(
        &self,
        id: OverrideId,
        localisation: &Localisation,
        user: &str,
    ) -> Result<LocalisationOverride> {
        self.overrides.update(id, localisation, user)
    }

    pub fn delete_override(&self, id: OverrideId) -> Result<()> {
        self.overrides.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_filters_rejected() {
        let params = QueryParams {
            namespace: Some("a".into()),
            category: Some("b".into()),
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(err, LokalisointiError::Validation(_)));
        assert_eq!(err.to_string(), NAMESPACE_MISMATCH);
    }

    #[test]
    fn test_category_is_namespace_alias() {
        let params = QueryParams {
            category: Some("a".into()),
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap().namespace.as_deref(), Some("a"));

        let both = QueryParams {
            namespace: Some("a".into()),
            category: Some("a".into()),
            ..Default::default()
        };
        assert_eq!(both.validate().unwrap().namespace.as_deref(), Some("a"));
    }
}
