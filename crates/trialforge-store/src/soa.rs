//! SOA-pipeline repository: table extraction results, merge plans, and
//! merge-group stage results (spec §3, §4.G SOA module).

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::types::{MergeGroup, MergeGroupResult, MergePlan, SoaTableCategory, TableResult};

pub fn upsert_table_result(conn: &Connection, result: &TableResult) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO soa_table_results
            (job_id, table_id, category, page_start, page_end, status, output_json,
             visit_count, activity_count, instance_count, footnote_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(job_id, table_id) DO UPDATE SET
            category = excluded.category,
            page_start = excluded.page_start,
            page_end = excluded.page_end,
            status = excluded.status,
            output_json = excluded.output_json,
            visit_count = excluded.visit_count,
            activity_count = excluded.activity_count,
            instance_count = excluded.instance_count,
            footnote_count = excluded.footnote_count",
        params![
            result.job_id,
            result.table_id,
            result.category.as_str(),
            result.page_start,
            result.page_end,
            result.status,
            serde_json::to_string(&result.output)?,
            result.visit_count,
            result.activity_count,
            result.instance_count,
            result.footnote_count,
        ],
    )?;
    Ok(())
}

pub fn list_table_results(conn: &Connection, job_id: &str) -> Result<Vec<TableResult>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, table_id, category, page_start, page_end, status, output_json,
                visit_count, activity_count, instance_count, footnote_count
         FROM soa_table_results WHERE job_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![job_id], row_to_table_result)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_table_result(row: &rusqlite::Row) -> rusqlite::Result<TableResult> {
    let category_str: String = row.get(2)?;
    let output: String = row.get(6)?;
    Ok(TableResult {
        job_id: row.get(0)?,
        table_id: row.get(1)?,
        category: parse_category(&category_str),
        page_start: row.get(3)?,
        page_end: row.get(4)?,
        status: row.get(5)?,
        output: serde_json::from_str(&output).unwrap_or(serde_json::json!({})),
        visit_count: row.get(7)?,
        activity_count: row.get(8)?,
        instance_count: row.get(9)?,
        footnote_count: row.get(10)?,
    })
}

fn parse_category(s: &str) -> SoaTableCategory {
    match s {
        "PK_SOA" => SoaTableCategory::PkSoa,
        "SAFETY_SOA" => SoaTableCategory::SafetySoa,
        "PD_SOA" => SoaTableCategory::PdSoa,
        _ => SoaTableCategory::MainSoa,
    }
}

pub fn save_merge_plan(conn: &Connection, plan: &MergePlan) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO merge_plans (job_id, groups_json) VALUES (?1, ?2)
         ON CONFLICT(job_id) DO UPDATE SET groups_json = excluded.groups_json",
        params![plan.job_id, serde_json::to_string(&plan.groups)?],
    )?;
    Ok(())
}

pub fn get_merge_plan(conn: &Connection, job_id: &str) -> Result<Option<MergePlan>, StoreError> {
    let groups_json: Option<String> = conn
        .query_row(
            "SELECT groups_json FROM merge_plans WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match groups_json {
        Some(raw) => {
            let groups: Vec<MergeGroup> = serde_json::from_str(&raw)?;
            Some(MergePlan {
                job_id: job_id.to_string(),
                groups,
            })
        }
        None => None,
    })
}

pub fn save_merge_group_result(conn: &Connection, result: &MergeGroupResult) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO merge_group_results (job_id, group_id, stage_results_json) VALUES (?1, ?2, ?3)
         ON CONFLICT(job_id, group_id) DO UPDATE SET stage_results_json = excluded.stage_results_json",
        params![
            result.job_id,
            result.group_id,
            serde_json::to_string(&result.stage_results)?
        ],
    )?;
    Ok(())
}

pub fn list_merge_group_results(
    conn: &Connection,
    job_id: &str,
) -> Result<Vec<MergeGroupResult>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, group_id, stage_results_json FROM merge_group_results WHERE job_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![job_id], |row| {
            let stage_results: String = row.get(2)?;
            Ok(MergeGroupResult {
                job_id: row.get(0)?,
                group_id: row.get(1)?,
                stage_results: serde_json::from_str(&stage_results).unwrap_or(serde_json::json!({})),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
