//! Module-result repository (spec §3 "ModuleResult"). Unique on
//! `(job_id, module_id)`; writes are upserts so a module re-run during
//! resume replaces its prior row.

use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::types::{ModuleResult, ModuleResultStatus};

pub fn upsert(conn: &Connection, result: &ModuleResult) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO module_results
            (job_id, module_id, status, extracted_data_json, provenance_coverage, quality_score_json,
             pass1_duration_ms, pass2_duration_ms, retry_count, from_cache, error_details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(job_id, module_id) DO UPDATE SET
            status = excluded.status,
            extracted_data_json = excluded.extracted_data_json,
            provenance_coverage = excluded.provenance_coverage,
            quality_score_json = excluded.quality_score_json,
            pass1_duration_ms = excluded.pass1_duration_ms,
            pass2_duration_ms = excluded.pass2_duration_ms,
            retry_count = excluded.retry_count,
            from_cache = excluded.from_cache,
            error_details = excluded.error_details",
        params![
            result.job_id,
            result.module_id,
            result.status.as_str(),
            serde_json::to_string(&result.extracted_data)?,
            result.provenance_coverage,
            serde_json::to_string(&result.quality_score)?,
            result.pass1_duration_ms,
            result.pass2_duration_ms,
            result.retry_count,
            result.from_cache as i64,
            result.error_details,
        ],
    )?;
    Ok(())
}

pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<ModuleResult>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, module_id, status, extracted_data_json, provenance_coverage, quality_score_json,
                pass1_duration_ms, pass2_duration_ms, retry_count, from_cache, error_details
         FROM module_results WHERE job_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![job_id], row_to_result)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn completed_module_ids(conn: &Connection, job_id: &str) -> Result<Vec<String>, StoreError> {
    Ok(list_for_job(conn, job_id)?
        .into_iter()
        .filter(|r| r.status == ModuleResultStatus::Completed)
        .map(|r| r.module_id)
        .collect())
}

fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<ModuleResult> {
    let status_str: String = row.get(2)?;
    let extracted_data: String = row.get(3)?;
    let quality_score: String = row.get(5)?;
    Ok(ModuleResult {
        job_id: row.get(0)?,
        module_id: row.get(1)?,
        status: ModuleResultStatus::parse(&status_str).unwrap_or(ModuleResultStatus::Failed),
        extracted_data: serde_json::from_str(&extracted_data).unwrap_or(serde_json::json!({})),
        provenance_coverage: row.get(4)?,
        quality_score: serde_json::from_str(&quality_score).unwrap_or(serde_json::json!({})),
        pass1_duration_ms: row.get(6)?,
        pass2_duration_ms: row.get(7)?,
        retry_count: row.get::<_, i64>(8)? as u32,
        from_cache: row.get::<_, i64>(9)? != 0,
        error_details: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jobs, protocols, schema, types::JobKind};

    fn sample_result(job_id: &str, module_id: &str) -> ModuleResult {
        ModuleResult {
            job_id: job_id.to_string(),
            module_id: module_id.to_string(),
            status: ModuleResultStatus::Completed,
            extracted_data: serde_json::json!({"id": "x"}),
            provenance_coverage: 0.97,
            quality_score: serde_json::json!({"accuracy": 0.99}),
            pass1_duration_ms: 1200,
            pass2_duration_ms: 0,
            retry_count: 0,
            from_cache: false,
            error_details: None,
        }
    }

    #[test]
    fn upsert_replaces_prior_row_for_same_key() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();

        upsert(&conn, &sample_result(&job.id, "mod_1")).unwrap();
        let mut second = sample_result(&job.id, "mod_1");
        second.retry_count = 2;
        upsert(&conn, &second).unwrap();

        let rows = list_for_job(&conn, &job.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].retry_count, 2);
    }

    #[test]
    fn preserves_declaration_order() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();

        for id in ["mod_1", "mod_2", "mod_3"] {
            upsert(&conn, &sample_result(&job.id, id)).unwrap();
        }

        let ids: Vec<_> = list_for_job(&conn, &job.id)
            .unwrap()
            .into_iter()
            .map(|r| r.module_id)
            .collect();
        assert_eq!(ids, vec!["mod_1", "mod_2", "mod_3"]);
    }
}
