//! The twelve interpretation stages, in pipeline order (spec §4.G).

mod activity_expansion;
mod alternatives;
mod compliance_check;
mod conditional_expansion;
mod cycle_expansion;
mod domain_categorization;
mod hierarchy;
mod human_review;
mod protocol_mining;
mod schedule_generation;
mod specimen_enrichment;
mod timing_distribution;

pub use activity_expansion::ActivityExpansionStage;
pub use alternatives::AlternativeResolutionStage;
pub use compliance_check::ComplianceCheckStage;
pub use conditional_expansion::ConditionalExpansionStage;
pub use cycle_expansion::CycleExpansionStage;
pub use domain_categorization::DomainCategorizationStage;
pub use hierarchy::HierarchyBuildingStage;
pub use human_review::HumanReviewAssemblyStage;
pub use protocol_mining::ProtocolMiningStage;
pub use schedule_generation::ScheduleGenerationStage;
pub use specimen_enrichment::SpecimenEnrichmentStage;
pub use timing_distribution::TimingDistributionStage;
