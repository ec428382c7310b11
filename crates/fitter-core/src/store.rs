// ============================================================================
// OverrideStore — Embedded Calibration Database (redb)
// ============================================================================
// Persists the per-garment transform override map between sessions.
// One table, one key: the whole map is written wholesale on every mutation
// and the key is deleted on reset, so the stored shape stays exactly
// { item_id: { offset_x_pct?, offset_y_pct?, scale? } }.
// Default path: ~/.virtual-fitter/fitter.redb (override via FITTER_DB_PATH)
// ============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redb::{Database, TableDefinition};
use tracing::{debug, info};

use crate::types::{FitterError, TransformPatch};

const OVERRIDES: TableDefinition<&str, &[u8]> = TableDefinition::new("overrides");

/// The single key holding the JSON-serialized override map
const OVERRIDES_KEY: &str = "overrides:item_transforms";

fn storage_err(context: &str, e: impl std::fmt::Display) -> FitterError {
    FitterError::Storage(format!("{}: {}", context, e))
}

/// Embedded store for persisted garment calibration
pub struct OverrideStore {
    db: Database,
    path: PathBuf,
}

impl OverrideStore {
    /// Open (or create) the store at the given path.
    /// If `path` is None, uses FITTER_DB_PATH env var or
    /// ~/.virtual-fitter/fitter.redb
    pub fn open(path: Option<&str>) -> Result<Self, FitterError> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("FITTER_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir()
                .ok_or_else(|| FitterError::Storage("cannot determine home directory".into()))?;
            let fitter_dir = home.join(".virtual-fitter");
            std::fs::create_dir_all(&fitter_dir)
                .map_err(|e| storage_err("failed to create .virtual-fitter directory", e))?;
            fitter_dir.join("fitter.redb")
        };

        info!("Opening calibration store at: {}", db_path.display());

        let db = Database::create(&db_path).map_err(|e| storage_err("failed to open store", e))?;

        // Ensure the table exists by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write", e))?;
        {
            let _ = write_txn
                .open_table(OVERRIDES)
                .map_err(|e| storage_err("failed to create overrides table", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit init", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted override map. An absent key reads as an empty map.
    pub fn load(&self) -> Result<HashMap<i64, TransformPatch>, FitterError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("failed to begin read", e))?;
        let table = read_txn
            .open_table(OVERRIDES)
            .map_err(|e| storage_err("failed to open overrides table", e))?;

        match table
            .get(OVERRIDES_KEY)
            .map_err(|e| storage_err("failed to get overrides", e))?
        {
            Some(value) => {
                let map: HashMap<i64, TransformPatch> = serde_json::from_slice(value.value())
                    .map_err(|e| storage_err("failed to deserialize overrides", e))?;
                debug!("Loaded {} persisted overrides", map.len());
                Ok(map)
            }
            None => Ok(HashMap::new()),
        }
    }

    /// Overwrite the persisted override map wholesale
    pub fn save(&self, overrides: &HashMap<i64, TransformPatch>) -> Result<(), FitterError> {
        let value = serde_json::to_vec(overrides)
            .map_err(|e| storage_err("failed to serialize overrides", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write", e))?;
        {
            let mut table = write_txn
                .open_table(OVERRIDES)
                .map_err(|e| storage_err("failed to open overrides table", e))?;
            table
                .insert(OVERRIDES_KEY, value.as_slice())
                .map_err(|e| storage_err("failed to insert overrides", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit", e))?;

        debug!("Persisted {} overrides", overrides.len());
        Ok(())
    }

    /// Erase the persisted record entirely (reset-to-original).
    /// Returns whether a record was present.
    pub fn clear(&self) -> Result<bool, FitterError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(OVERRIDES)
                .map_err(|e| storage_err("failed to open overrides table", e))?;
            removed = table
                .remove(OVERRIDES_KEY)
                .map_err(|e| storage_err("failed to remove overrides", e))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit delete", e))?;

        if removed {
            debug!("Cleared persisted overrides");
        }
        Ok(removed)
    }

    /// Whether a persisted record currently exists
    pub fn has_record(&self) -> Result<bool, FitterError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("failed to begin read", e))?;
        let table = read_txn
            .open_table(OVERRIDES)
            .map_err(|e| storage_err("failed to open overrides table", e))?;
        Ok(table
            .get(OVERRIDES_KEY)
            .map_err(|e| storage_err("failed to get overrides", e))?
            .is_some())
    }

    /// Statistics for the inspection CLI
    pub fn stats(&self) -> Result<StoreStats, FitterError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("failed to begin read", e))?;
        let table = read_txn
            .open_table(OVERRIDES)
            .map_err(|e| storage_err("failed to open overrides table", e))?;

        match table
            .get(OVERRIDES_KEY)
            .map_err(|e| storage_err("failed to get overrides", e))?
        {
            Some(value) => {
                let bytes = value.value().len();
                let map: HashMap<i64, TransformPatch> = serde_json::from_slice(value.value())
                    .map_err(|e| storage_err("failed to deserialize overrides", e))?;
                Ok(StoreStats {
                    entries: map.len(),
                    record_bytes: bytes,
                })
            }
            None => Ok(StoreStats {
                entries: 0,
                record_bytes: 0,
            }),
        }
    }
}

/// Size summary of the persisted record
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub record_bytes: usize,
}
