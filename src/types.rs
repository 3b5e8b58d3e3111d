//! Shared primitive IDs and index-related enums.

use std::fmt;

/// Primary key of a log record.
pub type LogId = String;
/// Epoch milliseconds.
pub type Timestamp = i64;

/// Secondary index over one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    /// Contact references, one key per contact.
    ContactId,
    /// Originating service.
    Service,
    /// Creation timestamp.
    Timestamp,
    /// Phone numbers, one key per number.
    Tel,
    /// Entry type such as `incoming` or `missed`.
    Type,
}

impl IndexName {
    /// Every index maintained by the store.
    pub const ALL: [IndexName; 5] = [
        IndexName::ContactId,
        IndexName::Service,
        IndexName::Timestamp,
        IndexName::Tel,
        IndexName::Type,
    ];

    /// Name stored in the `idx` column.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexName::ContactId => "contactId",
            IndexName::Service => "service",
            IndexName::Timestamp => "timestamp",
            IndexName::Tel => "tel",
            IndexName::Type => "type",
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cursor scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Ascending keys.
    Next,
    /// Descending keys, most recent first.
    #[default]
    Prev,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            Direction::Next => Direction::Prev,
            Direction::Prev => Direction::Next,
        }
    }
}

/// Key value stored in an index.
///
/// Integers sort before text, the same way SQLite orders mixed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    /// Integer key (timestamps).
    Int(i64),
    /// Text key.
    Text(String),
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(v) => write!(f, "{v}"),
            IndexKey::Text(v) => write!(f, "{v:?}"),
        }
    }
}
