//! Store event stream payloads.

use crate::types::{IndexName, LogId};

/// Events emitted by the store worker after successful writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A record was inserted or replaced.
    Stored {
        /// Stored record id.
        id: LogId,
    },
    /// A delete by id completed, whether or not the record existed.
    Deleted {
        /// Requested id.
        id: LogId,
    },
    /// A bulk delete over one index completed.
    Cleared {
        /// Index the range was applied to.
        index: IndexName,
        /// Number of records removed.
        removed: usize,
    },
}
