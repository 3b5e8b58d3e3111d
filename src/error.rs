//! Errors surfaced by the store handle and the manager.

use thiserror::Error;

use crate::{persist::PersistError, types::IndexKey};

/// All errors returned by [`crate::runtime::handle::LogStore`] and
/// [`crate::manager::LogManager`].
#[derive(Debug, Error)]
pub enum LogError {
    /// The database could not be opened or upgraded. Every caller of a store
    /// whose open failed receives a copy of the same reason.
    #[error("log database unavailable: {0}")]
    Connection(String),

    /// A single operation failed; the store stays usable.
    #[error("log transaction failed: {0}")]
    Transaction(#[from] PersistError),

    /// A filter named none of the queryable fields.
    #[error("filter does not name a contact, time range, service or type")]
    UnrecognizedFilter,

    /// Every generated identifier collided with an existing record.
    #[error("no free log identifier after {attempts} attempts")]
    IdentifierSpaceExhausted {
        /// Number of identifiers tried.
        attempts: u32,
    },

    /// The lower bound of a range sorts above its upper bound.
    #[error("invalid key range: lower bound {lower} is above upper bound {upper}")]
    InvalidKeyRange {
        /// Requested lower bound.
        lower: IndexKey,
        /// Requested upper bound.
        upper: IndexKey,
    },

    /// The store worker has shut down.
    #[error("log store is closed")]
    Closed,
}
