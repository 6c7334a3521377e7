//! Eight-level merge-group analyzer (spec §3 "MergePlan": "an 8-level
//! analyzer"), reimplemented from usage shape — `soa_worker.py` calls
//! `TableMergeAnalyzer.analyze_merge_candidates(per_table_results, ...)`
//! returning a `merge_plan` of `merge_groups`/`standalone_tables`, but
//! `table_merge_analyzer.py` itself was not retrieved into
//! `original_source/`. The levels below are a deterministic cascade over
//! the fields this engine actually has on a detected table (category,
//! page range, visit/activity/instance/footnote counts, and the activity
//! labels in its schedule fragment): each level is a stronger-to-weaker
//! merge signal, and two tables merge at the first level where they
//! agree. Groups form by transitive closure over pairwise matches, same
//! as a union-find over an adjacency relation.

use std::collections::{HashMap, HashSet};

use trialforge_store::types::{MergeGroup, MergePlan, TableResult};

/// One level of the cascade: a name, and a predicate over a pair of
/// tables. Levels are tried in order, strongest signal first; the first
/// level that agrees for a pair decides both the merge type and the
/// confidence for that pair.
struct Level {
    merge_type: &'static str,
    confidence: f64,
    reasoning: &'static str,
    matches: fn(&TableResult, &TableResult) -> bool,
}

fn activity_names(table: &TableResult) -> HashSet<String> {
    table
        .output
        .get("activities")
        .and_then(serde_json::Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a.get("name").and_then(serde_json::Value::as_str))
                .map(|s| s.trim().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

fn visit_names(table: &TableResult) -> HashSet<String> {
    table
        .output
        .get("encounters")
        .and_then(serde_json::Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|e| e.get("name").and_then(serde_json::Value::as_str))
                .map(|s| s.trim().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

fn pages_adjacent_or_overlapping(a: &TableResult, b: &TableResult) -> bool {
    a.page_start <= b.page_end + 1 && b.page_start <= a.page_end + 1
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn levels() -> [Level; 8] {
    [
        Level {
            merge_type: "identical_schedule",
            confidence: 0.99,
            reasoning: "same category, identical visit and activity counts",
            matches: |a, b| a.category == b.category && a.visit_count == b.visit_count && a.activity_count == b.activity_count && a.visit_count > 0,
        },
        Level {
            merge_type: "adjacent_continuation",
            confidence: 0.95,
            reasoning: "same category on adjacent or overlapping pages",
            matches: |a, b| a.category == b.category && pages_adjacent_or_overlapping(a, b),
        },
        Level {
            merge_type: "visit_union",
            confidence: 0.9,
            reasoning: "same category, overlapping visit columns",
            matches: |a, b| a.category == b.category && jaccard(&visit_names(a), &visit_names(b)) >= 0.5,
        },
        Level {
            merge_type: "subset_absorb",
            confidence: 0.85,
            reasoning: "one table's activities are a subset of the other's",
            matches: |a, b| {
                let (names_a, names_b) = (activity_names(a), activity_names(b));
                !names_a.is_empty()
                    && !names_b.is_empty()
                    && a.category == b.category
                    && (names_a.is_subset(&names_b) || names_b.is_subset(&names_a))
                    && names_a != names_b
            },
        },
        Level {
            merge_type: "activity_overlap",
            confidence: 0.75,
            reasoning: "substantial activity-label overlap within the same category",
            matches: |a, b| a.category == b.category && jaccard(&activity_names(a), &activity_names(b)) >= 0.5,
        },
        Level {
            merge_type: "footnote_linked",
            confidence: 0.7,
            reasoning: "both tables carry footnote markers and sit on adjacent pages",
            matches: |a, b| a.footnote_count > 0 && b.footnote_count > 0 && pages_adjacent_or_overlapping(a, b),
        },
        Level {
            merge_type: "satellite_merge",
            confidence: 0.6,
            reasoning: "a PK/safety/PD satellite schedule adjacent to the main schedule",
            matches: |a, b| a.category != b.category && pages_adjacent_or_overlapping(a, b),
        },
        Level {
            merge_type: "same_category_fallback",
            confidence: 0.4,
            reasoning: "same category with no stronger signal, kept together as a last resort",
            matches: |a, b| a.category == b.category,
        },
    ]
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Run the 8-level cascade over every confirmed/extracted table for a
/// job, producing a [`MergePlan`]. Tables with no match at any level are
/// simply not referenced by any group — callers treat any table id absent
/// from every `MergeGroup.source_table_ids` as standalone (spec §3: "an
/// ordered list of MergeGroups ... ").
pub fn analyze(job_id: &str, tables: &[TableResult]) -> MergePlan {
    let levels = levels();
    let mut uf = UnionFind::new(tables.len());
    let mut decided_level: HashMap<(usize, usize), usize> = HashMap::new();

    for i in 0..tables.len() {
        for j in (i + 1)..tables.len() {
            for (level_idx, level) in levels.iter().enumerate() {
                if (level.matches)(&tables[i], &tables[j]) {
                    uf.union(i, j);
                    decided_level.insert((i, j), level_idx);
                    break;
                }
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..tables.len() {
        let root = uf.find(i);
        clusters.entry(root).or_default().push(i);
    }

    let mut groups = Vec::new();
    for (group_idx, (_, members)) in clusters.into_iter().filter(|(_, m)| m.len() > 1).enumerate() {
        let weakest_level = members
            .iter()
            .enumerate()
            .flat_map(|(a_pos, &a)| members[a_pos + 1..].iter().map(move |&b| (a.min(b), a.max(b))))
            .filter_map(|pair| decided_level.get(&pair).copied())
            .max()
            .unwrap_or(0);

        let level = &levels[weakest_level];
        groups.push(MergeGroup {
            group_id: format!("merge_{}", group_idx + 1),
            source_table_ids: members.iter().map(|&idx| tables[idx].table_id.clone()).collect(),
            merge_type: level.merge_type.to_string(),
            decision_level: (weakest_level + 1) as u8,
            confidence: level.confidence,
            reasoning: level.reasoning.to_string(),
        });
    }

    MergePlan { job_id: job_id.to_string(), groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialforge_store::types::SoaTableCategory;

    fn table(table_id: &str, category: SoaTableCategory, page_start: i64, page_end: i64, visit_count: i64, activity_count: i64) -> TableResult {
        TableResult {
            job_id: "job_1".to_string(),
            table_id: table_id.to_string(),
            category,
            page_start,
            page_end,
            status: "extracted".to_string(),
            output: serde_json::json!({}),
            visit_count,
            activity_count,
            instance_count: visit_count * activity_count,
            footnote_count: 0,
        }
    }

    #[test]
    fn identical_schedules_merge_at_the_strongest_level() {
        let tables = vec![
            table("SOA-1", SoaTableCategory::MainSoa, 10, 12, 4, 8),
            table("SOA-2", SoaTableCategory::MainSoa, 50, 52, 4, 8),
        ];
        let plan = analyze("job_1", &tables);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].merge_type, "identical_schedule");
        assert_eq!(plan.groups[0].decision_level, 1);
        assert_eq!(plan.groups[0].source_table_ids.len(), 2);
    }

    #[test]
    fn adjacent_same_category_tables_merge_as_a_continuation() {
        let tables = vec![
            table("SOA-1", SoaTableCategory::MainSoa, 10, 11, 4, 8),
            table("SOA-2", SoaTableCategory::MainSoa, 12, 13, 6, 10),
        ];
        let plan = analyze("job_1", &tables);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].merge_type, "adjacent_continuation");
    }

    #[test]
    fn unrelated_tables_produce_no_group() {
        let tables = vec![
            table("SOA-1", SoaTableCategory::MainSoa, 10, 11, 4, 8),
            table("SOA-2", SoaTableCategory::SafetySoa, 200, 201, 2, 3),
        ];
        let plan = analyze("job_1", &tables);
        assert!(plan.groups.is_empty());
    }

    #[test]
    fn a_satellite_table_adjacent_to_main_merges_at_the_satellite_level() {
        let tables = vec![
            table("SOA-1", SoaTableCategory::MainSoa, 10, 11, 4, 8),
            table("SOA-2", SoaTableCategory::PkSoa, 12, 12, 3, 2),
        ];
        let plan = analyze("job_1", &tables);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].merge_type, "satellite_merge");
    }
}
