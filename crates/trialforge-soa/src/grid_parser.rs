//! Deterministic HTML table grid parser (spec §4.F `extracting` state),
//! reimplemented from usage shape — `soa_html_grid_parser.py` is described
//! by the SOA pipeline's calling code but was not retrieved into
//! `original_source/`, and no HTML-parsing crate (`scraper`, `html5ever`,
//! `kuchiki`, `tl`, `select`, ...) appears anywhere in this codebase's
//! dependency graph or the wider example pack. We ask the model to
//! transcribe each detected table as HTML (a far more reliable transcript
//! format for rowspan/colspan-heavy grids than freeform JSON) and parse
//! that HTML deterministically here with a regex tag walk, the same way
//! `page_offset::detect_page_offset` reimplements a documented-but-absent
//! heuristic with a regex rather than transliterating a missing file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::SoaError;

static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap());
static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)<t([dh])([^>]*)>(.*?)</t[dh]>"#).unwrap());
static ROWSPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)rowspan\s*=\s*"?(\d+)"?"#).unwrap());
static COLSPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)colspan\s*=\s*"?(\d+)"?"#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static FOOTNOTE_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\*{1,3}|\d+\)|\[\d+\])").unwrap());

/// A cell's role within the grid, classified from its own text — the
/// header row names visits, the first column names activities, and the
/// body cells mark which activities happen at which visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    VisitHeader,
    ActivityLabel,
    Check,
    Empty,
    Footnote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub text: String,
    pub cell_type: CellType,
}

/// A dense, rowspan/colspan-expanded table: `rows[r][c]` is always
/// populated, even for cells that only exist because a spanning cell
/// above or to the left of them covers that position.
#[derive(Debug, Clone, Default)]
pub struct TableGrid {
    pub rows: Vec<Vec<GridCell>>,
}

const CHECK_INDICATORS: &[&str] = &["x", "X", "✓", "√", "yes", "Yes", "YES", "●", "■"];

/// Parse an HTML table transcription into a dense grid, expanding
/// `rowspan`/`colspan` by carrying a spanning cell's content forward into
/// every grid position it covers.
pub fn parse_html_table(html: &str) -> Result<TableGrid, SoaError> {
    let row_matches: Vec<_> = ROW_RE.captures_iter(html).collect();
    if row_matches.is_empty() {
        return Err(SoaError::MalformedTable("no <tr> rows found in table transcription".to_string()));
    }

    // pending[col] = (remaining_rows, cell) for an active rowspan that
    // still owns column `col` in a future row.
    let mut pending: Vec<Option<(usize, GridCell)>> = Vec::new();
    let mut rows: Vec<Vec<GridCell>> = Vec::new();

    for (row_idx, row_caps) in row_matches.iter().enumerate() {
        let row_html = &row_caps[1];
        let mut raw_cells: Vec<(GridCell, usize, usize)> = Vec::new();
        for cell_caps in CELL_RE.captures_iter(row_html) {
            let is_header = cell_caps[1].eq_ignore_ascii_case("h");
            let attrs = &cell_caps[2];
            let inner = &cell_caps[3];
            let text = strip_tags(inner);
            let rowspan = ROWSPAN_RE.captures(attrs).and_then(|c| c[1].parse().ok()).unwrap_or(1).max(1);
            let colspan = COLSPAN_RE.captures(attrs).and_then(|c| c[1].parse().ok()).unwrap_or(1).max(1);
            let cell_type = classify_cell(&text, is_header, row_idx == 0);
            raw_cells.push((GridCell { text, cell_type }, rowspan, colspan));
        }

        let width = pending.len().max(raw_cells.iter().map(|(_, _, colspan)| *colspan).sum::<usize>() + pending.iter().filter(|p| p.is_some()).count());
        if pending.len() < width {
            pending.resize(width, None);
        }

        let mut row: Vec<GridCell> = Vec::new();
        let mut raw_iter = raw_cells.into_iter();
        let mut col = 0usize;
        loop {
            if col < pending.len() {
                if let Some((remaining, cell)) = pending[col].clone() {
                    row.push(cell.clone());
                    pending[col] = if remaining > 1 { Some((remaining - 1, cell)) } else { None };
                    col += 1;
                    continue;
                }
            }
            match raw_iter.next() {
                Some((cell, rowspan, colspan)) => {
                    for span in 0..colspan {
                        row.push(cell.clone());
                        let target = col + span;
                        if target >= pending.len() {
                            pending.resize(target + 1, None);
                        }
                        if rowspan > 1 {
                            pending[target] = Some((rowspan - 1, cell.clone()));
                        }
                    }
                    col += colspan;
                }
                None => break,
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(TableGrid { rows })
}

fn strip_tags(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn classify_cell(text: &str, is_header: bool, in_first_row: bool) -> CellType {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellType::Empty;
    }
    if FOOTNOTE_MARKER_RE.is_match(trimmed) && trimmed.len() <= 4 {
        return CellType::Footnote;
    }
    if is_header || in_first_row {
        return CellType::VisitHeader;
    }
    if CHECK_INDICATORS.contains(&trimmed) {
        return CellType::Check;
    }
    CellType::ActivityLabel
}

#[derive(Debug, Clone, Default)]
pub struct TableSummary {
    pub visit_count: i64,
    pub activity_count: i64,
    pub instance_count: i64,
    pub footnote_count: i64,
    /// `{"activities": [...], "encounters": [...], "scheduledActivityInstances": [...]}`
    /// — a document fragment in the shape the twelve-stage interpretation
    /// pipeline expects (spec §4.G), ready to be unioned with other
    /// tables' fragments once their merge group is confirmed.
    pub schedule_fragment: Value,
}

/// Summarize a parsed grid into counts and a schedule-document fragment.
/// Convention: row 0 is the visit header (first cell is the corner, the
/// rest name visits); column 0 of every other row names an activity; any
/// other cell marks whether that activity happens at that visit.
pub fn summarize(table_id: &str, grid: &TableGrid) -> TableSummary {
    let Some(header) = grid.rows.first() else {
        return TableSummary::default();
    };

    let encounters: Vec<Value> = header
        .iter()
        .skip(1)
        .enumerate()
        .filter(|(_, cell)| !cell.text.trim().is_empty())
        .map(|(idx, cell)| {
            json!({
                "id": format!("{table_id}-ENC-{}", idx + 1),
                "name": cell.text.trim(),
            })
        })
        .collect();

    let mut activities = Vec::new();
    let mut instances = Vec::new();
    let mut footnote_count = 0i64;

    for (row_idx, row) in grid.rows.iter().enumerate().skip(1) {
        let Some(label_cell) = row.first() else { continue };
        let label = label_cell.text.trim();
        if label.is_empty() || label_cell.cell_type == CellType::Footnote {
            continue;
        }
        let activity_id = format!("{table_id}-ACT-{row_idx}");
        activities.push(json!({"id": activity_id, "name": label}));

        for (col_idx, cell) in row.iter().enumerate().skip(1) {
            match cell.cell_type {
                CellType::Check => {
                    if let Some(encounter) = encounters.get(col_idx - 1) {
                        instances.push(json!({
                            "id": format!("{table_id}-SAI-{row_idx}-{col_idx}"),
                            "activityId": activity_id,
                            "encounterId": encounter["id"],
                        }));
                    }
                }
                CellType::Footnote => footnote_count += 1,
                _ => {}
            }
        }
    }

    let visit_count = encounters.len() as i64;
    let activity_count = activities.len() as i64;
    let instance_count = instances.len() as i64;

    TableSummary {
        visit_count,
        activity_count,
        instance_count,
        footnote_count,
        schedule_fragment: json!({
            "encounters": encounters,
            "activities": activities,
            "scheduledActivityInstances": instances,
        }),
    }
}
