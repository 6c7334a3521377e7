//! Append-only event sink (spec §3 "Event", spec §5 "Events for one job are
//! totally ordered by the event sink's monotonically increasing id").

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::types::Event;

pub fn emit(
    conn: &Connection,
    job_id: &str,
    event_type: &str,
    module_id: Option<&str>,
    payload: &serde_json::Value,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO events (job_id, event_type, module_id, payload_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            job_id,
            event_type,
            module_id,
            serde_json::to_string(payload)?,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, event_type, module_id, payload_json, created_at
         FROM events WHERE job_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![job_id], |row| {
            let payload: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(Event {
                id: row.get(0)?,
                job_id: row.get(1)?,
                event_type: row.get(2)?,
                module_id: row.get(3)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::json!({})),
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jobs, protocols, schema, types::JobKind};

    #[test]
    fn events_are_returned_in_monotonic_id_order() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();

        emit(&conn, &job.id, "module_started", Some("mod_1"), &serde_json::json!({})).unwrap();
        emit(&conn, &job.id, "module_completed", Some("mod_1"), &serde_json::json!({})).unwrap();
        emit(&conn, &job.id, "module_started", Some("mod_2"), &serde_json::json!({})).unwrap();

        let events = list_for_job(&conn, &job.id).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(events[0].event_type, "module_started");
        assert_eq!(events[2].module_id.as_deref(), Some("mod_2"));
    }

    #[test]
    fn events_scoped_by_job_id() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job_a = jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        let job_b = jobs::create_job(&mut conn, &proto.id, JobKind::Soa).unwrap();

        emit(&conn, &job_a.id, "module_started", None, &serde_json::json!({})).unwrap();
        emit(&conn, &job_b.id, "detecting_pages", None, &serde_json::json!({})).unwrap();

        assert_eq!(list_for_job(&conn, &job_a.id).unwrap().len(), 1);
        assert_eq!(list_for_job(&conn, &job_b.id).unwrap().len(), 1);
    }
}
