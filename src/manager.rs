//! Application-facing facade over [`LogStore`].
//!
//! Each request is answered from exactly one index, picked in a fixed
//! priority order: contact, then time range, then service, then type. Other
//! filter fields on the same request are ignored.

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::LogError,
    query::IndexQuery,
    record::LogRecord,
    runtime::handle::LogStore,
    types::{IndexName, Timestamp},
};

/// Sparse filter for [`LogManager::find`] and [`LogManager::clear`].
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogFilter {
    /// Match records referencing this contact.
    pub contact_id: Option<String>,
    /// Inclusive lower timestamp bound.
    pub from: Option<Timestamp>,
    /// Inclusive upper timestamp bound.
    pub to: Option<Timestamp>,
    /// Match records from this service.
    pub service: Option<String>,
    /// Match records of this type.
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    /// Return oldest entries first instead of newest first.
    pub reverse: bool,
}

impl LogFilter {
    /// Builds the single index query this filter maps to.
    pub fn to_index_query(&self) -> Result<IndexQuery, LogError> {
        let mut query = if let Some(contact) = non_empty(&self.contact_id) {
            let mut q = IndexQuery::new(IndexName::ContactId);
            q.set_filter_value(contact);
            q
        } else if self.from.is_some() || self.to.is_some() {
            let mut q = IndexQuery::new(IndexName::Timestamp);
            if let Some(from) = self.from {
                q.set_lower(from);
            }
            if let Some(to) = self.to {
                q.set_upper(to);
            }
            q
        } else if let Some(service) = non_empty(&self.service) {
            let mut q = IndexQuery::new(IndexName::Service);
            q.set_filter_value(service);
            q
        } else if let Some(kind) = non_empty(&self.record_type) {
            let mut q = IndexQuery::new(IndexName::Type);
            q.set_filter_value(kind);
            q
        } else {
            return Err(LogError::UnrecognizedFilter);
        };

        if self.reverse {
            query.invert_order();
        }
        Ok(query)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Log operations for application code.
#[derive(Clone)]
pub struct LogManager {
    store: LogStore,
}

impl LogManager {
    /// Wraps an existing store handle.
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// Underlying store handle.
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Stores `entry`. Does nothing when there is no entry.
    pub async fn put(&self, entry: Option<LogRecord>) -> Result<(), LogError> {
        let Some(entry) = entry else {
            return Ok(());
        };
        self.store.put(entry).await
    }

    /// Deletes the entry with `id`. Does nothing when `id` is missing or empty.
    pub async fn delete(&self, id: Option<&str>) -> Result<(), LogError> {
        match id {
            Some(id) if !id.is_empty() => self.store.delete(id).await,
            _ => Ok(()),
        }
    }

    /// Returns entries matching the highest-priority field of `filter`.
    pub async fn find(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, LogError> {
        let query = filter.to_index_query()?;
        debug!(index = %query.index(), "find");
        self.store.get_by_index(&query).await
    }

    /// Deletes entries matching the highest-priority field of `filter`.
    ///
    /// An empty filter is rejected rather than treated as "delete all".
    pub async fn clear(&self, filter: &LogFilter) -> Result<usize, LogError> {
        let query = filter.to_index_query()?;
        debug!(index = %query.index(), "clear");
        self.store.delete_by_index(&query).await
    }
}
