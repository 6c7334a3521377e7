//! Exit codes for pipeline worker processes (spec §6).
//!
//! The supervisor only distinguishes zero from non-zero (spec §4.E), but
//! worker binaries use distinct codes so operators reading process logs
//! can tell failure modes apart without parsing the job record.

/// Worker process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 2;
    pub const TRANSIENT_IO: i32 = 3;
    pub const PIPELINE_FATAL: i32 = 4;
    pub const OTHER: i32 = 1;
}

use crate::error::{EngineError, ErrorCategory};

impl From<&EngineError> for ExitCode {
    fn from(err: &EngineError) -> Self {
        let code = match err.category() {
            ErrorCategory::Config => codes::CONFIG_ERROR,
            ErrorCategory::Transient => codes::TRANSIENT_IO,
            ErrorCategory::PipelineFatal => codes::PIPELINE_FATAL,
            ErrorCategory::QualityThreshold
            | ErrorCategory::ParseFailure
            | ErrorCategory::ModuleLevel => codes::OTHER,
        };
        Self(code)
    }
}
