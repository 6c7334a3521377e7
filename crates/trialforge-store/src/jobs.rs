//! Job repository (spec §3 "Job"). Enforces "exactly one job per
//! (protocol, kind) may be in a non-terminal state at a time" (spec §3
//! invariant) at the application layer, inside a transaction, since
//! SQLite has no partial-unique-index-with-predicate portable enough to
//! rely on across backends.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json;

use crate::error::StoreError;
use crate::types::{Job, JobKind, Progress};
use trialforge_utils::ids::new_id;

const TERMINAL_STATUSES: [&str; 3] = ["completed", "completed_with_errors", "failed"];

pub fn create_job(conn: &mut Connection, protocol_id: &str, kind: JobKind) -> Result<Job, StoreError> {
    let tx = conn.transaction()?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM jobs WHERE protocol_id = ?1 AND kind = ?2 AND status NOT IN (?3, ?4, ?5)",
            params![
                protocol_id,
                kind.as_str(),
                TERMINAL_STATUSES[0],
                TERMINAL_STATUSES[1],
                TERMINAL_STATUSES[2]
            ],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_job_id) = existing {
        return Err(StoreError::ConcurrentJob {
            protocol_id: protocol_id.to_string(),
            kind: kind.as_str().to_string(),
            existing_job_id,
        });
    }

    let id = new_id("job");
    tx.execute(
        "INSERT INTO jobs (id, protocol_id, kind, status, current_phase, progress_json, started_at, completed_at, error_message, result_json)
         VALUES (?1, ?2, ?3, 'pending', NULL, '{}', NULL, NULL, NULL, '{}')",
        params![id, protocol_id, kind.as_str()],
    )?;
    tx.commit()?;

    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> Result<Job, StoreError> {
    conn.query_row(
        "SELECT id, protocol_id, kind, status, current_phase, progress_json, started_at, completed_at, error_message, result_json
         FROM jobs WHERE id = ?1",
        params![id],
        row_to_job,
    )
    .optional()?
    .ok_or_else(|| StoreError::JobNotFound(id.to_string()))
}

/// Transition a job to `status`, optionally updating `current_phase`.
/// Each call uses the connection it's given directly — per spec §4.F,
/// "Transition persistence uses a fresh connection per update" in the
/// original design; here every worker already opens its own short-lived
/// connection (spec §4.E), so a single `UPDATE` per call satisfies that
/// requirement without extra connection churn.
pub fn set_status(
    conn: &Connection,
    id: &str,
    status: &str,
    current_phase: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET status = ?2, current_phase = ?3 WHERE id = ?1",
        params![id, status, current_phase],
    )?;
    Ok(())
}

pub fn start(conn: &Connection, id: &str) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET status = 'running', started_at = ?2 WHERE id = ?1",
        params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn complete(
    conn: &Connection,
    id: &str,
    status: &str,
    result: &serde_json::Value,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET status = ?2, completed_at = ?3, result_json = ?4 WHERE id = ?1",
        params![
            id,
            status,
            Utc::now().to_rfc3339(),
            serde_json::to_string(result)?
        ],
    )?;
    Ok(())
}

/// Persist an intermediate result payload without completing the job —
/// used by a pause-state confirmation step (e.g. confirming a SOA merge
/// plan) to stash the document the `interpret` phase will pick up next,
/// while the job is still mid-flight through its state machine.
pub fn save_result(conn: &Connection, id: &str, result: &serde_json::Value) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET result_json = ?2 WHERE id = ?1",
        params![id, serde_json::to_string(result)?],
    )?;
    Ok(())
}

pub fn fail(conn: &Connection, id: &str, error_message: &str) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET status = 'failed', completed_at = ?2, error_message = ?3 WHERE id = ?1",
        params![id, Utc::now().to_rfc3339(), error_message],
    )?;
    Ok(())
}

pub fn update_progress(conn: &Connection, id: &str, progress: &Progress) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET progress_json = ?2 WHERE id = ?1",
        params![id, serde_json::to_string(progress)?],
    )?;
    Ok(())
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let kind_str: String = row.get(2)?;
    let progress_json: String = row.get(5)?;
    let result_json: String = row.get(9)?;
    Ok(Job {
        id: row.get(0)?,
        protocol_id: row.get(1)?,
        kind: JobKind::parse(&kind_str).unwrap_or(JobKind::ModuleExtraction),
        status: row.get(3)?,
        current_phase: row.get(4)?,
        progress: serde_json::from_str(&progress_json).unwrap_or_default(),
        started_at: row.get::<_, Option<String>>(6)?.map(|s| parse_dt(&s)),
        completed_at: row.get::<_, Option<String>>(7)?.map(|s| parse_dt(&s)),
        error_message: row.get(8)?,
        result: serde_json::from_str(&result_json).unwrap_or(serde_json::json!({})),
    })
}

fn parse_dt(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocols, schema};

    #[test]
    fn rejects_second_non_terminal_job_of_same_kind() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();

        create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        let err = create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentJob { .. }));
    }

    #[test]
    fn allows_new_job_once_prior_one_is_terminal() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();

        let first = create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        complete(&conn, &first.id, "completed", &serde_json::json!({})).unwrap();

        let second = create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn different_kinds_can_run_concurrently() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();

        create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        let soa = create_job(&mut conn, &proto.id, JobKind::Soa);
        assert!(soa.is_ok());
    }
}
