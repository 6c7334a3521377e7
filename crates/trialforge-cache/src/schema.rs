//! Self-contained migration for the cache's own SQLite database. Kept
//! separate from `trialforge-store`'s schema so the cache stays usable as
//! an independent component (spec §4.A).

use rusqlite::Connection;

use crate::error::CacheError;

pub fn migrate(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;

        CREATE TABLE IF NOT EXISTS cache_entries (
            cache_key TEXT PRIMARY KEY,
            module_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            result_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_entries_module ON cache_entries(module_id);
        ",
    )?;
    Ok(())
}

pub fn open(path: &str) -> Result<Connection, CacheError> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    migrate(&conn)?;
    Ok(conn)
}
