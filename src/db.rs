//! Opens the data-store connection and cache from `Config` (spec §6
//! "Environment: data-store URL").

use rusqlite::Connection;
use trialforge_cache::Cache;
use trialforge_config::Config;
use trialforge_utils::error::EngineError;

/// Strips a `sqlite://` scheme prefix, if present, down to the bare path
/// `rusqlite` expects (`:memory:` or a filesystem path).
fn sqlite_path(database_url: &str) -> &str {
    database_url.strip_prefix("sqlite://").unwrap_or(database_url)
}

pub fn open_store(config: &Config) -> Result<Connection, EngineError> {
    trialforge_store::schema::open(sqlite_path(&config.database_url)).map_err(|e| EngineError::Store(e.to_string()))
}

pub fn open_cache(config: &Config) -> Result<Cache, EngineError> {
    std::fs::create_dir_all(&config.cache_dir).map_err(EngineError::Io)?;
    let db_path = config.cache_dir.join("cache.sqlite3");
    Cache::open(&db_path.to_string_lossy(), config.cache_dir.join("files")).map_err(|e| EngineError::Cache(e.to_string()))
}
