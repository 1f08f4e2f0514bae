//! SQLite-backed registry storage with optimistic versioning.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use uuid::Uuid;

use canonize_core::{EntityRegistryEntry, StatusEntry};

use crate::error::RegistryError;
use crate::snapshot::RegistrySnapshot;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS registry_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS entities (
    entity_id TEXT PRIMARY KEY,
    organization_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS name_variants (
    entity_id TEXT NOT NULL REFERENCES entities(entity_id),
    variant TEXT NOT NULL,
    PRIMARY KEY (entity_id, variant)
);

CREATE TABLE IF NOT EXISTS status_history (
    entity_id TEXT NOT NULL REFERENCES entities(entity_id),
    seq INTEGER NOT NULL,
    status TEXT NOT NULL,
    changed_at TEXT NOT NULL,
    PRIMARY KEY (entity_id, seq)
);
"#;

pub struct RegistryStore {
    conn: Connection,
}

impl RegistryStore {
    /// Open (or create) the registry database at `path`.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO registry_meta (id, version) VALUES (1, 0)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn load(&self) -> Result<RegistrySnapshot, RegistryError> {
        let version: i64 =
            self.conn
                .query_row("SELECT version FROM registry_meta WHERE id = 1", [], |row| {
                    row.get(0)
                })?;

        let mut entries: BTreeMap<Uuid, EntityRegistryEntry> = BTreeMap::new();

        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, organization_name FROM entities")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id_text, organization_name) = row?;
            let entity_id = parse_uuid(&id_text)?;
            entries.insert(
                entity_id,
                EntityRegistryEntry {
                    entity_id,
                    organization_name,
                    name_variants: Default::default(),
                    status_history: Vec::new(),
                },
            );
        }

        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, variant FROM name_variants")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id_text, variant) = row?;
            let entity_id = parse_uuid(&id_text)?;
            if let Some(entry) = entries.get_mut(&entity_id) {
                entry.name_variants.insert(variant);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT entity_id, status, changed_at FROM status_history ORDER BY entity_id, seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (id_text, status, changed_at) = row?;
            let entity_id = parse_uuid(&id_text)?;
            if let Some(entry) = entries.get_mut(&entity_id) {
                entry.status_history.push(StatusEntry {
                    status,
                    changed_at: parse_timestamp(&changed_at)?,
                });
            }
        }

        Ok(RegistrySnapshot { version, entries })
    }

    /// Persist `snapshot` as version `expected_version + 1`.
    ///
    /// Runs under an immediate transaction. Fails with `VersionMismatch` if
    /// another writer has advanced the version since `expected_version` was
    /// loaded, and with `Invariant` if the snapshot would drop an entity or
    /// rewrite recorded history.
    pub fn persist(
        &mut self,
        expected_version: i64,
        snapshot: &RegistrySnapshot,
    ) -> Result<i64, RegistryError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: i64 =
            tx.query_row("SELECT version FROM registry_meta WHERE id = 1", [], |row| {
                row.get(0)
            })?;
        if found != expected_version {
            return Err(RegistryError::VersionMismatch {
                expected: expected_version,
                found,
            });
        }

        validate_append_only(&tx, snapshot)?;

        tx.execute("DELETE FROM status_history", [])?;
        tx.execute("DELETE FROM name_variants", [])?;
        tx.execute("DELETE FROM entities", [])?;

        {
            let mut entity_stmt = tx.prepare(
                "INSERT INTO entities (entity_id, organization_name) VALUES (?1, ?2)",
            )?;
            let mut variant_stmt = tx.prepare(
                "INSERT INTO name_variants (entity_id, variant) VALUES (?1, ?2)",
            )?;
            let mut history_stmt = tx.prepare(
                "INSERT INTO status_history (entity_id, seq, status, changed_at) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for entry in snapshot.entries.values() {
                let id_text = entry.entity_id.to_string();
                entity_stmt.execute(params![id_text, entry.organization_name])?;
                for variant in &entry.name_variants {
                    variant_stmt.execute(params![id_text, variant])?;
                }
                for (seq, status) in entry.status_history.iter().enumerate() {
                    history_stmt.execute(params![
                        id_text,
                        seq as i64,
                        status.status,
                        status.changed_at.to_rfc3339(),
                    ])?;
                }
            }
        }

        let new_version = expected_version + 1;
        tx.execute(
            "UPDATE registry_meta SET version = ?1 WHERE id = 1",
            params![new_version],
        )?;
        tx.commit()?;
        Ok(new_version)
    }
}

/// Every stored entity must survive, and its stored status history must be
/// a prefix of the incoming one.
fn validate_append_only(
    tx: &rusqlite::Transaction<'_>,
    snapshot: &RegistrySnapshot,
) -> Result<(), RegistryError> {
    let mut stmt = tx.prepare("SELECT entity_id FROM entities")?;
    let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;

    for id in ids {
        let id_text = id?;
        let entity_id = parse_uuid(&id_text)?;
        let Some(entry) = snapshot.entries.get(&entity_id) else {
            return Err(RegistryError::Invariant(format!(
                "entity {entity_id} would be removed from the registry"
            )));
        };

        let mut history_stmt = tx.prepare(
            "SELECT status, changed_at FROM status_history WHERE entity_id = ?1 ORDER BY seq",
        )?;
        let stored = history_stmt.query_map(params![id_text], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut index = 0usize;
        for row in stored {
            let (status, changed_at) = row?;
            let matches = entry.status_history.get(index).is_some_and(|e| {
                e.status == status && e.changed_at.to_rfc3339() == changed_at
            });
            if !matches {
                return Err(RegistryError::Invariant(format!(
                    "status history of entity {entity_id} would be rewritten at position {index}"
                )));
            }
            index += 1;
        }
    }

    Ok(())
}

fn parse_uuid(text: &str) -> Result<Uuid, RegistryError> {
    Uuid::parse_str(text)
        .map_err(|e| RegistryError::Storage(format!("malformed entity id '{text}': {e}")))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, RegistryError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegistryError::Storage(format!("malformed timestamp '{text}': {e}")))
}
