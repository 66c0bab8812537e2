//! Overlay of overrides onto base translations

use std::collections::{HashMap, HashSet};

use crate::types::{Localisation, LocalisationOverride, TranslationKey};

/// Filter shared by base translations and overrides; `None` fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub namespace: Option<String>,
    pub locale: Option<String>,
    pub key: Option<String>,
}

impl Filter {
    pub fn matches_file(&self, namespace: Option<&str>, locale: &str) -> bool {
        self.namespace
            .as_deref()
            .map_or(true, |ns| namespace == Some(ns))
            && self.locale.as_deref().map_or(true, |l| l == locale)
    }

    pub fn matches(&self, namespace: Option<&str>, locale: &str, key: &str) -> bool {
        self.matches_file(namespace, locale) && self.key.as_deref().map_or(true, |k| k == key)
    }

    pub fn matches_override(&self, o: &LocalisationOverride) -> bool {
        self.matches(o.namespace.as_deref(), &o.locale, &o.key)
    }
}

/// Index overrides by triple, keeping the first one seen for duplicated triples
pub fn index_overrides(
    overrides: &[LocalisationOverride],
) -> HashMap<TranslationKey, &LocalisationOverride> {
    let mut index = HashMap::with_capacity(overrides.len());
    for o in overrides {
        index.entry(o.triple()).or_insert(o);
    }
    index
}

/// Merge base translations with overrides.
///
/// Base translations whose triple has an override take its value and id;
/// overrides without a base translation are appended. Every triple occurs
/// once in the output. Overrides are expected in id order so that the
/// lowest id wins among duplicates.
pub fn merge(base: Vec<Localisation>, overrides: &[LocalisationOverride]) -> Vec<Localisation> {
    let index = index_overrides(overrides);
    let mut seen: HashSet<TranslationKey> = HashSet::with_capacity(base.len());
    let mut result = Vec::with_capacity(base.len() + index.len());

    for mut localisation in base {
        let triple = localisation.triple();
        if seen.contains(&triple) {
            continue;
        }
        if let Some(o) = index.get(&triple) {
            localisation.value = o.value.clone();
            localisation.id = Some(o.id);
        } else {
            localisation.id = None;
        }
        seen.insert(triple);
        result.push(localisation);
    }

    // Iterate the slice rather than the index to keep orphans in id order
    for o in overrides {
        let triple = o.triple();
        if !seen.contains(&triple) {
            result.push(o.to_localisation());
            seen.insert(triple);
        }
    }

    result
}
