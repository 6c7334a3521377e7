//! Shared foundations used by every crate in the extraction engine: the
//! root error type, exit codes, atomic file writes, content hashing,
//! id generation, and logging initialization.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod hash;
pub mod ids;
pub mod logging;

pub use error::{EngineError, Result, UserFriendlyError};
