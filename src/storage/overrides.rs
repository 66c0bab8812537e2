//! Override persistence
//!
//! Free query functions over a borrowed connection plus [`OverrideStore`],
//! which owns the [`Storage`] handle and runs them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::connection::Storage;
use crate::error::Result;
use crate::types::{Localisation, LocalisationOverride, OverrideId};

const SELECT_COLUMNS: &str = "SELECT id, namespace, locale, localisation_key, localisation_value,
        created_by, created, updated_by, updated
    FROM localisation_override";

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Convert a database row to an override
pub fn override_from_row(row: &Row) -> rusqlite::Result<LocalisationOverride> {
    let created: String = row.get("created")?;
    let updated: String = row.get("updated")?;

    Ok(LocalisationOverride {
        id: row.get("id")?,
        namespace: row.get("namespace")?,
        locale: row.get("locale")?,
        key: row.get("localisation_key")?,
        value: row.get("localisation_value")?,
        created_by: row.get("created_by")?,
        created: parse_timestamp(&created),
        updated_by: row.get("updated_by")?,
        updated: parse_timestamp(&updated),
    })
}

/// All overrides, oldest first
pub fn list_overrides(conn: &Connection) -> Result<Vec<LocalisationOverride>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
    let rows = stmt.query_map([], override_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_override(conn: &Connection, id: OverrideId) -> Result<Option<LocalisationOverride>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            override_from_row,
        )
        .optional()?)
}

pub fn insert_override(
    conn: &Connection,
    localisation: &Localisation,
    user: &str,
) -> Result<LocalisationOverride> {
    let now = Utc::now();
    let stamp = now.to_rfc3339();

    conn.execute(
        "INSERT INTO localisation_override
            (namespace, locale, localisation_key, localisation_value,
             created_by, created, updated_by, updated)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            localisation.namespace,
            localisation.locale,
            localisation.key,
            localisation.value,
            user,
            stamp,
            user,
            stamp,
        ],
    )?;

    Ok(LocalisationOverride {
        id: conn.last_insert_rowid(),
        namespace: localisation.namespace.clone(),
        locale: localisation.locale.clone(),
        key: localisation.key.clone(),
        value: localisation.value.clone(),
        created_by: user.to_string(),
        created: parse_timestamp(&stamp),
        updated_by: user.to_string(),
        updated: parse_timestamp(&stamp),
    })
}

/// Overwrite an existing override; `None` when the id does not exist
pub fn update_override(
    conn: &Connection,
    id: OverrideId,
    localisation: &Localisation,
    user: &str,
) -> Result<Option<LocalisationOverride>> {
    let now = Utc::now().to_rfc3339();

    let affected = conn.execute(
        "UPDATE localisation_override
         SET namespace = ?, locale = ?, localisation_key = ?, localisation_value = ?,
             updated_by = ?, updated = ?
         WHERE id = ?",
        params![
            localisation.namespace,
            localisation.locale,
            localisation.key,
            localisation.value,
            user,
            now,
            id,
        ],
    )?;

    if affected == 0 {
        return Ok(None);
    }
    get_override(conn, id)
}

/// Delete an override; returns whether a row existed
pub fn delete_override(conn: &Connection, id: OverrideId) -> Result<bool> {
    let affected = conn.execute("DELETE FROM localisation_override WHERE id = ?", params![id])?;
    Ok(affected > 0)
}

pub fn override_namespaces(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT namespace FROM localisation_override WHERE namespace IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
}

/// CRUD over persisted override rows
#[derive(Clone)]
pub struct OverrideStore {
    storage: Storage,
}

impl OverrideStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Every override ordered by id, so the lowest id of a duplicated triple comes first
    pub fn find_all(&self) -> Result<Vec<LocalisationOverride>> {
        self.storage.with_connection(list_overrides)
    }

    pub fn find_by_id(&self, id: OverrideId) -> Result<Option<LocalisationOverride>> {
        self.storage.with_connection(|conn| get_override(conn, id))
    }

    pub fn insert(&self, localisation: &Localisation, user: &str) -> Result<LocalisationOverride> {
        let stored = self
            .storage
            .with_connection(|conn| insert_override(conn, localisation, user))?;
        tracing::info!(
            "Created override {} for {:?}/{}/{} by {}",
            stored.id,
            stored.namespace,
            stored.locale,
            stored.key,
            user
        );
        Ok(stored)
    }

    /// Update the override with `id`, inserting a new row when it does not exist
    pub fn update(
        &self,
        id: OverrideId,
        localisation: &Localisation,
        user: &str,
    ) -> Result<LocalisationOverride> {
        let updated = self.storage.with_transaction(|conn| {
            match update_override(conn, id, localisation, user)? {
                Some(stored) => Ok((stored, false)),
                None => Ok((insert_override(conn, localisation, user)?, true)),
            }
        })?;

        match updated {
            (stored, true) => {
                tracing::info!(
                    "Override {} did not exist, inserted as {} by {}",
                    id,
                    stored.id,
                    user
                );
                Ok(stored)
            }
            (stored, false) => {
                tracing::info!("Updated override {} by {}", id, user);
                Ok(stored)
            }
        }
    }

    /// Delete the override with `id`; a missing id is not an error
    pub fn delete(&self, id: OverrideId) -> Result<()> {
        if self.storage.with_connection(|conn| delete_override(conn, id))? {
            tracing::info!("Deleted override {}", id);
        } else {
            tracing::debug!("Override {} already absent", id);
        }
        Ok(())
    }

    /// Distinct namespaces of the stored overrides
    pub fn available_namespaces(&self) -> Result<BTreeSet<String>> {
        self.storage.with_connection(override_namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(namespace: Option<&str>, key: &str, value: &str) -> Localisation {
        Localisation::base(namespace.map(String::from), key, "fi", value)
    }

    #[test]
    fn test_insert_and_find() {
        let store = OverrideStore::open_in_memory().unwrap();
        let stored = store.insert(&loc(Some("example"), "greet", "Hei"), "alice").unwrap();

        assert!(stored.id > 0);
        assert_eq!(stored.created_by, "alice");
        assert_eq!(stored.updated_by, "alice");

        let found = store.find_by_id(stored.id).unwrap().unwrap();
        assert_eq!(found, stored);
        assert_eq!(store.find_by_id(stored.id + 1).unwrap(), None);
    }

    #[test]
    fn test_null_namespace_survives_roundtrip() {
        let store = OverrideStore::open_in_memory().unwrap();
        let stored = store.insert(&loc(None, "root", "Juuri"), "alice").unwrap();
        assert_eq!(store.find_by_id(stored.id).unwrap().unwrap().namespace, None);
    }

    #[test]
    fn test_find_all_orders_by_id() {
        let store = OverrideStore::open_in_memory().unwrap();
        let first = store.insert(&loc(Some("a"), "k", "1"), "u").unwrap();
        let second = store.insert(&loc(Some("a"), "k", "2"), "u").unwrap();

        let ids: Vec<_> = store.find_all().unwrap().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_update_bumps_updated_fields() {
        let store = OverrideStore::open_in_memory().unwrap();
        let stored = store.insert(&loc(Some("a"), "k", "old"), "alice").unwrap();

        let updated = store.update(stored.id, &loc(Some("a"), "k", "new"), "bob").unwrap();
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.value, "new");
        assert_eq!(updated.created_by, "alice");
        assert_eq!(updated.updated_by, "bob");
        assert!(updated.updated >= stored.updated);
    }

    #[test]
    fn test_update_missing_id_inserts() {
        let store = OverrideStore::open_in_memory().unwrap();
        let stored = store.update(42, &loc(Some("a"), "k", "v"), "bob").unwrap();

        assert_ne!(stored.id, 42);
        assert_eq!(stored.created_by, "bob");
        assert_eq!(store.find_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = OverrideStore::open_in_memory().unwrap();
        let stored = store.insert(&loc(Some("a"), "k", "v"), "u").unwrap();

        store.delete(stored.id).unwrap();
        store.delete(stored.id).unwrap();
        assert!(store.find_all().unwrap().is_empty());
    }

    #[test]
    fn test_available_namespaces_skips_null() {
        let store = OverrideStore::open_in_memory().unwrap();
        store.insert(&loc(Some("b"), "k", "v"), "u").unwrap();
        store.insert(&loc(Some("a"), "k", "v"), "u").unwrap();
        store.insert(&loc(Some("a"), "k2", "v"), "u").unwrap();
        store.insert(&loc(None, "k", "v"), "u").unwrap();

        let namespaces: Vec<_> = store.available_namespaces().unwrap().into_iter().collect();
        assert_eq!(namespaces, vec!["a".to_string(), "b".to_string()]);
    }
}
