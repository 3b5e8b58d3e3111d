//! Log identifier generation.

use uuid::Uuid;

use crate::types::LogId;

/// Source of candidate identifiers for new records.
///
/// Implementations need not guarantee uniqueness; the store probes for
/// collisions and asks again.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh candidate identifier.
    fn next_id(&self) -> LogId;
}

/// Random 36-character identifiers in `8-4-4-4-12` hex grouping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> LogId {
        generate_id()
    }
}

/// Generates a random identifier. Uniqueness is not checked here.
pub fn generate_id() -> LogId {
    Uuid::new_v4().hyphenated().to_string()
}
