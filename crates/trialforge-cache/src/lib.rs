//! Content-addressed extraction cache (spec §4.A), ported from
//! `extraction_cache.py::ExtractionCache`. SQLite is the primary store;
//! a file-per-entry tier under `file_cache_dir` is a fallback so a cache
//! read still succeeds if the database is briefly unavailable (e.g. a
//! worker process started before the db file existed).

pub mod error;
pub mod key;
pub mod schema;

pub use error::CacheError;
pub use key::CacheKey;

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub db_entries: i64,
    pub file_entries: i64,
}

pub struct Cache {
    conn: Connection,
    file_cache_dir: PathBuf,
}

impl Cache {
    pub fn open(db_path: &str, file_cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let conn = schema::open(db_path)?;
        let file_cache_dir = file_cache_dir.into();
        fs::create_dir_all(&file_cache_dir).map_err(|source| CacheError::FileIo {
            path: file_cache_dir.display().to_string(),
            source,
        })?;
        Ok(Self { conn, file_cache_dir })
    }

    fn file_path(&self, key: &CacheKey) -> PathBuf {
        self.file_cache_dir.join(format!("{}.json", key.file_key()))
    }

    /// Look up a cached result. Tries the database first; on a db miss,
    /// falls back to the file tier so a fresh worker process reading an
    /// older cache still benefits.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let db_hit: Option<String> = self
            .conn
            .query_row(
                "SELECT result_json FROM cache_entries WHERE cache_key = ?1",
                params![key.combined],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(json) = db_hit {
            return Ok(Some(serde_json::from_str(&json)?));
        }

        let path = self.file_path(key);
        if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| CacheError::FileIo {
                path: path.display().to_string(),
                source,
            })?;
            return Ok(Some(serde_json::from_str(&contents)?));
        }

        Ok(None)
    }

    /// Store a result in both tiers, keyed on `key`.
    pub fn set(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let created_at = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO cache_entries (cache_key, module_id, model_id, result_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(cache_key) DO UPDATE SET
                result_json = excluded.result_json,
                created_at = excluded.created_at",
            params![key.combined, key.module_id, key.model_id, json, created_at],
        )?;

        let path = self.file_path(key);
        trialforge_utils::atomic_write::write_file_atomic(&path, json.as_bytes()).map_err(|source| {
            CacheError::FileIo {
                path: path.display().to_string(),
                source,
            }
        })?;

        Ok(())
    }

    /// Remove an entry from both tiers. Used when a module's prompt or
    /// schema changes in a way the key closure doesn't capture (should be
    /// rare — the closure is designed to capture exactly that).
    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.conn
            .execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key.combined])?;

        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| CacheError::FileIo {
                path: path.display().to_string(),
                source,
            })?;
        }

        Ok(())
    }

    /// Reports db and file entry counts separately rather than summed,
    /// since an entry present in both tiers should not be double-counted
    /// nor silently merged into one opaque number.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let db_entries: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;

        let file_entries = count_json_files(&self.file_cache_dir)?;

        Ok(CacheStats { db_entries, file_entries })
    }
}

fn count_json_files(dir: &Path) -> Result<i64, CacheError> {
    let mut count = 0i64;
    let entries = fs::read_dir(dir).map_err(|source| CacheError::FileIo {
        path: dir.display().to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| CacheError::FileIo {
            path: dir.display().to_string(),
            source,
        })?;
        if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
            count += 1;
        }
    }
    Ok(count)
}
