//! Schema migration. A single `migrate` call is idempotent (`CREATE TABLE
//! IF NOT EXISTS`) so every worker process can call it on startup without
//! coordinating with the others (spec §4.E "Children ... re-open the data
//! store with their own connection").

use rusqlite::Connection;

use crate::error::StoreError;

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS protocols (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            size_bytes INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            remote_file_uri TEXT,
            remote_file_expires_at TEXT
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            current_phase TEXT,
            progress_json TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            error_message TEXT,
            result_json TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_protocol_kind ON jobs(protocol_id, kind);

        CREATE TABLE IF NOT EXISTS module_results (
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            module_id TEXT NOT NULL,
            status TEXT NOT NULL,
            extracted_data_json TEXT NOT NULL,
            provenance_coverage REAL NOT NULL,
            quality_score_json TEXT NOT NULL,
            pass1_duration_ms INTEGER NOT NULL,
            pass2_duration_ms INTEGER NOT NULL,
            retry_count INTEGER NOT NULL,
            from_cache INTEGER NOT NULL,
            error_details TEXT,
            PRIMARY KEY (job_id, module_id)
        );

        CREATE TABLE IF NOT EXISTS soa_table_results (
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            table_id TEXT NOT NULL,
            category TEXT NOT NULL,
            page_start INTEGER NOT NULL,
            page_end INTEGER NOT NULL,
            status TEXT NOT NULL,
            output_json TEXT NOT NULL,
            visit_count INTEGER NOT NULL,
            activity_count INTEGER NOT NULL,
            instance_count INTEGER NOT NULL,
            footnote_count INTEGER NOT NULL,
            PRIMARY KEY (job_id, table_id)
        );

        CREATE TABLE IF NOT EXISTS merge_plans (
            job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
            groups_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS merge_group_results (
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            group_id TEXT NOT NULL,
            stage_results_json TEXT NOT NULL,
            PRIMARY KEY (job_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS eligibility_criteria (
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            criterion_id TEXT NOT NULL,
            section TEXT NOT NULL,
            text TEXT NOT NULL,
            status TEXT NOT NULL,
            queryability TEXT,
            funnel_rank INTEGER,
            PRIMARY KEY (job_id, criterion_id)
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            module_id TEXT,
            payload_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_job ON events(job_id, id);
        ",
    )?;
    Ok(())
}

/// Open (creating if absent) a SQLite database at `path` with keepalive-
/// friendly pragmas, migrate it, and return the connection. Spec §5 calls
/// for pool recycling on managed databases; a single `rusqlite::Connection`
/// has no pool to recycle, so instead each worker process opens its own
/// short-lived connection per spec §4.E, sidestepping idle-connection
/// termination entirely.
pub fn open(path: &str) -> Result<Connection, StoreError> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    migrate(&conn)?;
    Ok(conn)
}
