//! Two-phase, quality-directed module extraction (spec §4.C): pass-1
//! values, pass-2 provenance with a skip optimization, and surgical vs.
//! full retry driven by `trialforge-quality` scores. Cache integration
//! lives in [`with_cache::extract_with_cache`].

pub mod error;
pub mod extractor;
pub mod json_parse;
pub mod prompt;
pub mod surgical;
pub mod with_cache;

#[cfg(test)]
mod proptest;

pub use error::ExtractError;
pub use extractor::{ExtractionMetadata, ExtractionOutcome, TwoPhaseExtractor};
pub use with_cache::extract_with_cache;
