//! Five-dimension quality scoring (spec §4.B): accuracy, completeness,
//! USDM schema adherence, provenance coverage, and CDISC terminology
//! compliance, plus the post-processing auto-correction pipeline and
//! retry feedback generation that close the loop with `trialforge-extract`.

pub mod accuracy;
pub mod completeness;
pub mod error;
pub mod evaluate;
pub mod feedback;
pub mod postprocess;
pub mod schema_adherence;
pub mod score;

pub use error::QualityError;
pub use evaluate::{evaluate, evaluate_pass1, PassType};
pub use feedback::{generate_feedback_prompt, generate_pass1_feedback, generate_pass2_feedback};
pub use postprocess::post_process;
pub use score::QualityScore;
