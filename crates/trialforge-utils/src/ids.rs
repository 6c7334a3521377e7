//! Opaque id generation. Every entity in the data model (spec §3) is
//! addressed by an opaque string id rather than a row-object reference,
//! per the "replace ORM graphs with explicit repository functions"
//! re-architecture note (spec §9).

use uuid::Uuid;

/// Generate a new opaque id with the given entity prefix, e.g.
/// `new_id("job")` -> `"job_3fa2c1..."`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}
