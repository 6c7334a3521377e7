//! Agent-documentation catalog: an optional, generated-for-downstream-
//! automation section describing what each module extracts and how
//! modules relate to each other (depends-on / enriches / cross-references
//! edges). Ported from `usdm_combiner.py`'s
//! `_build_agent_documentation_catalog` / `_build_integration_graph` and
//! `app/agent_documentation.py`'s `AGENT_DOCUMENTATION_REGISTRY`.
//!
//! The full Python registry carries a paragraph of prose per module; this
//! keeps the structural shape (display name, wave, priority, downstream
//! systems, edges) and a one-line purpose rather than transliterating the
//! prose.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct AgentDoc {
    pub display_name: &'static str,
    pub purpose: &'static str,
    pub wave: u8,
    pub priority: &'static str,
    pub downstream_systems: &'static [&'static str],
    pub depends_on: &'static [&'static str],
    pub enriches: &'static [&'static str],
    pub cross_references: &'static [&'static str],
}

const REGISTRY: &[(&str, AgentDoc)] = &[
    (
        "study_metadata",
        AgentDoc {
            display_name: "Study Metadata",
            purpose: "Protocol identity, phase, sponsor, and design-level facts every other module anchors on.",
            wave: 1,
            priority: "critical",
            downstream_systems: &["CTMS", "EDC"],
            depends_on: &[],
            enriches: &["arms_design", "endpoints_estimands_sap"],
            cross_references: &[],
        },
    ),
    (
        "arms_design",
        AgentDoc {
            display_name: "Arms & Study Design",
            purpose: "Treatment arms, randomization, and blinding structure.",
            wave: 2,
            priority: "critical",
            downstream_systems: &["IRT", "EDC"],
            depends_on: &["study_metadata"],
            enriches: &["endpoints_estimands_sap", "concomitant_medications"],
            cross_references: &[],
        },
    ),
    (
        "endpoints_estimands_sap",
        AgentDoc {
            display_name: "Endpoints, Estimands & SAP",
            purpose: "Primary/secondary endpoints and the statistical analysis plan driving them.",
            wave: 3,
            priority: "critical",
            downstream_systems: &["ePRO"],
            depends_on: &["study_metadata", "arms_design"],
            enriches: &[],
            cross_references: &["adverse_events"],
        },
    ),
    (
        "adverse_events",
        AgentDoc {
            display_name: "Adverse Events",
            purpose: "AE/SAE reporting rules, causality assessment, and grading scales.",
            wave: 3,
            priority: "high",
            downstream_systems: &["Safety DB", "EDC"],
            depends_on: &["study_metadata"],
            enriches: &["safety_decision_points"],
            cross_references: &["endpoints_estimands_sap"],
        },
    ),
    (
        "safety_decision_points",
        AgentDoc {
            display_name: "Safety Decision Points",
            purpose: "Stopping rules, dose modifications, and DSMB review triggers.",
            wave: 4,
            priority: "high",
            downstream_systems: &["Safety DB"],
            depends_on: &["adverse_events"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "concomitant_medications",
        AgentDoc {
            display_name: "Concomitant Medications",
            purpose: "Permitted/prohibited medication lists and washout rules.",
            wave: 3,
            priority: "medium",
            downstream_systems: &["EDC"],
            depends_on: &["arms_design"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "biospecimen_handling",
        AgentDoc {
            display_name: "Biospecimen Handling",
            purpose: "Sample collection, processing, and shipment requirements.",
            wave: 4,
            priority: "medium",
            downstream_systems: &["LIMS"],
            depends_on: &["study_metadata"],
            enriches: &["laboratory_specifications"],
            cross_references: &[],
        },
    ),
    (
        "laboratory_specifications",
        AgentDoc {
            display_name: "Laboratory Specifications",
            purpose: "Lab panels, normal ranges, and central-lab requirements.",
            wave: 4,
            priority: "medium",
            downstream_systems: &["LIMS", "EDC"],
            depends_on: &["biospecimen_handling"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "data_management",
        AgentDoc {
            display_name: "Data Management",
            purpose: "CRF completion rules, query handling, and database lock criteria.",
            wave: 5,
            priority: "medium",
            downstream_systems: &["EDC"],
            depends_on: &["study_metadata"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "site_operations_logistics",
        AgentDoc {
            display_name: "Site Operations & Logistics",
            purpose: "Site staffing, drug accountability, and monitoring cadence.",
            wave: 5,
            priority: "low",
            downstream_systems: &["CTMS"],
            depends_on: &["arms_design"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "quality_management",
        AgentDoc {
            display_name: "Quality Management",
            purpose: "Protocol deviation handling and quality-oversight plans.",
            wave: 5,
            priority: "low",
            downstream_systems: &["CTMS"],
            depends_on: &["study_metadata"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "withdrawal_procedures",
        AgentDoc {
            display_name: "Withdrawal Procedures",
            purpose: "Subject discontinuation criteria and follow-up requirements.",
            wave: 4,
            priority: "medium",
            downstream_systems: &["EDC"],
            depends_on: &["arms_design"],
            enriches: &[],
            cross_references: &["adverse_events"],
        },
    ),
    (
        "imaging_central_reading",
        AgentDoc {
            display_name: "Imaging & Central Reading",
            purpose: "Imaging modality requirements and central-read adjudication.",
            wave: 4,
            priority: "medium",
            downstream_systems: &["Imaging Core Lab"],
            depends_on: &["endpoints_estimands_sap"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "pkpd_sampling",
        AgentDoc {
            display_name: "PK/PD Sampling",
            purpose: "Pharmacokinetic/pharmacodynamic sample timing and analysis.",
            wave: 4,
            priority: "medium",
            downstream_systems: &["Bioanalytical Lab"],
            depends_on: &["arms_design"],
            enriches: &[],
            cross_references: &["laboratory_specifications"],
        },
    ),
    (
        "informed_consent",
        AgentDoc {
            display_name: "Informed Consent",
            purpose: "Consent elements, re-consent triggers, and assent requirements.",
            wave: 2,
            priority: "high",
            downstream_systems: &["eConsent"],
            depends_on: &["study_metadata"],
            enriches: &[],
            cross_references: &[],
        },
    ),
    (
        "pro_specifications",
        AgentDoc {
            display_name: "PRO Specifications",
            purpose: "Patient-reported outcome instruments and administration schedule.",
            wave: 3,
            priority: "medium",
            downstream_systems: &["ePRO"],
            depends_on: &["endpoints_estimands_sap"],
            enriches: &[],
            cross_references: &[],
        },
    ),
];

#[must_use]
pub fn lookup(module_id: &str) -> Option<&'static AgentDoc> {
    REGISTRY.iter().find(|(id, _)| *id == module_id).map(|(_, doc)| doc)
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub display_name: &'static str,
    pub wave: u8,
    pub priority: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: &'static str,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IntegrationGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AgentDocumentationCatalog {
    pub description: &'static str,
    pub agents: BTreeMap<String, AgentCatalogEntry>,
    pub downstream_system_coverage: BTreeMap<String, Vec<String>>,
    pub integration_graph: IntegrationGraph,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentCatalogEntry {
    pub display_name: &'static str,
    pub purpose: &'static str,
    pub wave: u8,
    pub priority: &'static str,
    pub downstream_systems: &'static [&'static str],
}

const CATALOG_DESCRIPTION: &str = "Agent documentation for downstream system automation. Each agent's \
entry describes its purpose, wave, priority, and integration points with downstream systems.";

/// Build the catalog over the set of modules that actually completed —
/// mirrors the Python `for module_id in agent_results: if ... is None: continue`.
#[must_use]
pub fn build_catalog<'a>(completed_module_ids: impl IntoIterator<Item = &'a str>) -> AgentDocumentationCatalog {
    let mut catalog = AgentDocumentationCatalog {
        description: CATALOG_DESCRIPTION,
        ..Default::default()
    };

    let ids: Vec<&str> = completed_module_ids.into_iter().collect();

    for &module_id in &ids {
        let Some(doc) = lookup(module_id) else { continue };
        catalog.agents.insert(
            module_id.to_string(),
            AgentCatalogEntry {
                display_name: doc.display_name,
                purpose: doc.purpose,
                wave: doc.wave,
                priority: doc.priority,
                downstream_systems: doc.downstream_systems,
            },
        );
        for system in doc.downstream_systems {
            catalog
                .downstream_system_coverage
                .entry((*system).to_string())
                .or_default()
                .push(module_id.to_string());
        }
    }

    catalog.integration_graph = build_integration_graph(&ids);
    catalog
}

fn build_integration_graph(completed_module_ids: &[&str]) -> IntegrationGraph {
    let mut graph = IntegrationGraph::default();

    for &module_id in completed_module_ids {
        let Some(doc) = lookup(module_id) else { continue };
        graph.nodes.push(GraphNode {
            id: module_id.to_string(),
            display_name: doc.display_name,
            wave: doc.wave,
            priority: doc.priority,
        });

        for dep in doc.depends_on {
            graph.edges.push(GraphEdge {
                source: (*dep).to_string(),
                target: module_id.to_string(),
                edge_type: "depends_on",
            });
        }
        for target in doc.enriches {
            graph.edges.push(GraphEdge {
                source: module_id.to_string(),
                target: (*target).to_string(),
                edge_type: "enriches",
            });
        }
        for reference in doc.cross_references {
            graph.edges.push(GraphEdge {
                source: module_id.to_string(),
                target: (*reference).to_string(),
                edge_type: "cross_references",
            });
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_module_is_skipped_rather_than_erroring() {
        let catalog = build_catalog(["no_such_module"]);
        assert!(catalog.agents.is_empty());
        assert!(catalog.integration_graph.nodes.is_empty());
    }

    #[test]
    fn known_modules_produce_dependency_edges() {
        let catalog = build_catalog(["study_metadata", "arms_design"]);
        assert_eq!(catalog.agents.len(), 2);
        assert!(catalog
            .integration_graph
            .edges
            .iter()
            .any(|e| e.source == "study_metadata" && e.target == "arms_design" && e.edge_type == "depends_on"));
    }

    #[test]
    fn downstream_system_coverage_groups_agents_by_system() {
        let catalog = build_catalog(["study_metadata", "arms_design"]);
        assert!(catalog.downstream_system_coverage["EDC"].contains(&"study_metadata".to_string()));
        assert!(catalog.downstream_system_coverage["EDC"].contains(&"arms_design".to_string()));
    }
}
