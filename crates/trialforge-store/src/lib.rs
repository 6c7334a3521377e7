//! SQLite-backed repository layer for the extraction engine's persisted
//! entities (spec §3, §6). Every table is reached through a plain function
//! taking `&Connection` and ids/values — no ORM, no object graph (spec §9).

pub mod eligibility;
pub mod error;
pub mod events;
pub mod jobs;
pub mod module_results;
pub mod protocols;
pub mod schema;
pub mod soa;
pub mod types;

pub use error::StoreError;
pub use schema::open;
pub use types::{
    CriterionRecord, CriterionSection, Event, Job, JobKind, MergeGroup, MergeGroupResult, MergePlan,
    ModuleResult, ModuleResultStatus, Progress, Protocol, Queryability, SoaTableCategory, TableResult,
};
