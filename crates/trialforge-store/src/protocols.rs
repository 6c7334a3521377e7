//! Protocol repository (spec §3 "Protocol"). Content hash is unique: two
//! uploads with the same hash resolve to the same protocol row.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::types::Protocol;
use trialforge_utils::ids::new_id;

/// Insert a new protocol, or return the existing row if `content_hash`
/// already exists (spec §3 "two uploads with the same hash resolve to the
/// same protocol").
pub fn get_or_create(
    conn: &Connection,
    filename: &str,
    content_hash: &str,
    size_bytes: i64,
) -> Result<Protocol, StoreError> {
    if let Some(existing) = get_by_hash(conn, content_hash)? {
        return Ok(existing);
    }

    let id = new_id("proto");
    let now = Utc::now();
    conn.execute(
        "INSERT INTO protocols (id, filename, content_hash, size_bytes, created_at, updated_at, remote_file_uri, remote_file_expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, NULL, NULL)",
        params![id, filename, content_hash, size_bytes, now.to_rfc3339()],
    )?;

    get_by_hash(conn, content_hash)?.ok_or_else(|| StoreError::ProtocolNotFound(id.clone()))
}

pub fn get_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<Protocol>, StoreError> {
    conn.query_row(
        "SELECT id, filename, content_hash, size_bytes, created_at, updated_at, remote_file_uri, remote_file_expires_at
         FROM protocols WHERE content_hash = ?1",
        params![content_hash],
        row_to_protocol,
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn get(conn: &Connection, id: &str) -> Result<Protocol, StoreError> {
    conn.query_row(
        "SELECT id, filename, content_hash, size_bytes, created_at, updated_at, remote_file_uri, remote_file_expires_at
         FROM protocols WHERE id = ?1",
        params![id],
        row_to_protocol,
    )
    .optional()?
    .ok_or_else(|| StoreError::ProtocolNotFound(id.to_string()))
}

/// Refresh the cached remote-file handle on a protocol (spec §3 "remote
/// file handle refreshed on demand when expired").
pub fn set_remote_handle(
    conn: &Connection,
    id: &str,
    uri: &str,
    expires_at: chrono::DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE protocols SET remote_file_uri = ?2, remote_file_expires_at = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, uri, expires_at.to_rfc3339(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn row_to_protocol(row: &rusqlite::Row) -> rusqlite::Result<Protocol> {
    Ok(Protocol {
        id: row.get(0)?,
        filename: row.get(1)?,
        content_hash: row.get(2)?,
        size_bytes: row.get(3)?,
        created_at: parse_dt(row.get::<_, String>(4)?),
        updated_at: parse_dt(row.get::<_, String>(5)?),
        remote_file_uri: row.get(6)?,
        remote_file_expires_at: row.get::<_, Option<String>>(7)?.map(parse_dt),
    })
}

fn parse_dt(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn same_hash_resolves_to_same_protocol() {
        let conn = schema::open(":memory:").unwrap();
        let a = get_or_create(&conn, "protocol.pdf", "hash-1", 1024).unwrap();
        let b = get_or_create(&conn, "protocol-renamed.pdf", "hash-1", 1024).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn distinct_hashes_create_distinct_protocols() {
        let conn = schema::open(":memory:").unwrap();
        let a = get_or_create(&conn, "a.pdf", "hash-a", 10).unwrap();
        let b = get_or_create(&conn, "b.pdf", "hash-b", 20).unwrap();
        assert_ne!(a.id, b.id);
    }
}
