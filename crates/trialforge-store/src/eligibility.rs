//! Eligibility-pipeline repository: detected/confirmed criteria and their
//! funnel classification (spec §4.F eligibility job).

use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::types::{CriterionRecord, CriterionSection, Queryability};

pub fn upsert_criterion(conn: &Connection, record: &CriterionRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO eligibility_criteria
            (job_id, criterion_id, section, text, status, queryability, funnel_rank)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(job_id, criterion_id) DO UPDATE SET
            section = excluded.section,
            text = excluded.text,
            status = excluded.status,
            queryability = excluded.queryability,
            funnel_rank = excluded.funnel_rank",
        params![
            record.job_id,
            record.criterion_id,
            record.section.as_str(),
            record.text,
            record.status,
            record.queryability.map(Queryability::as_str),
            record.funnel_rank,
        ],
    )?;
    Ok(())
}

pub fn list_criteria(conn: &Connection, job_id: &str) -> Result<Vec<CriterionRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, criterion_id, section, text, status, queryability, funnel_rank
         FROM eligibility_criteria WHERE job_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![job_id], row_to_criterion)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_by_status(conn: &Connection, job_id: &str, status: &str) -> Result<Vec<CriterionRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, criterion_id, section, text, status, queryability, funnel_rank
         FROM eligibility_criteria WHERE job_id = ?1 AND status = ?2 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![job_id, status], row_to_criterion)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_criterion(row: &rusqlite::Row) -> rusqlite::Result<CriterionRecord> {
    let section_str: String = row.get(2)?;
    let queryability_str: Option<String> = row.get(5)?;
    Ok(CriterionRecord {
        job_id: row.get(0)?,
        criterion_id: row.get(1)?,
        section: CriterionSection::parse(&section_str).unwrap_or(CriterionSection::Inclusion),
        text: row.get(3)?,
        status: row.get(4)?,
        queryability: queryability_str.and_then(|s| Queryability::parse(&s)),
        funnel_rank: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jobs, protocols, schema, types::JobKind};

    fn sample(job_id: &str, criterion_id: &str) -> CriterionRecord {
        CriterionRecord {
            job_id: job_id.to_string(),
            criterion_id: criterion_id.to_string(),
            section: CriterionSection::Inclusion,
            text: "Age 18 or older".to_string(),
            status: "detected".to_string(),
            queryability: None,
            funnel_rank: None,
        }
    }

    #[test]
    fn criterion_upsert_is_idempotent_per_criterion() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::Eligibility).unwrap();

        upsert_criterion(&conn, &sample(&job.id, "crit_1")).unwrap();
        let mut confirmed = sample(&job.id, "crit_1");
        confirmed.status = "confirmed".to_string();
        confirmed.queryability = Some(Queryability::Queryable);
        confirmed.funnel_rank = Some(0);
        upsert_criterion(&conn, &confirmed).unwrap();

        let rows = list_criteria(&conn, &job.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "confirmed");
        assert_eq!(rows[0].queryability, Some(Queryability::Queryable));
    }

    #[test]
    fn list_by_status_filters_correctly() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::Eligibility).unwrap();

        upsert_criterion(&conn, &sample(&job.id, "crit_1")).unwrap();
        let mut skipped = sample(&job.id, "crit_2");
        skipped.status = "skipped".to_string();
        upsert_criterion(&conn, &skipped).unwrap();

        let detected = list_by_status(&conn, &job.id, "detected").unwrap();
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].criterion_id, "crit_1");
    }
}
