//! Index filter builder and key ranges.

use crate::{
    error::LogError,
    types::{Direction, IndexKey, IndexName},
};

/// Key bounds for a cursor scan over one index. All bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Every key.
    All,
    /// Exactly one key.
    Only(IndexKey),
    /// Keys in `[lower, upper]`.
    Bound {
        /// Inclusive lower bound.
        lower: IndexKey,
        /// Inclusive upper bound.
        upper: IndexKey,
    },
    /// Keys at or below the bound.
    UpperBound(IndexKey),
    /// Keys at or above the bound.
    LowerBound(IndexKey),
}

impl KeyRange {
    /// Returns true when `key` falls inside the range.
    pub fn contains(&self, key: &IndexKey) -> bool {
        match self {
            KeyRange::All => true,
            KeyRange::Only(v) => key == v,
            KeyRange::Bound { lower, upper } => lower <= key && key <= upper,
            KeyRange::UpperBound(upper) => key <= upper,
            KeyRange::LowerBound(lower) => lower <= key,
        }
    }
}

/// Sparse filter over a single index.
///
/// Built per query and discarded. The default order is descending, so the
/// newest entries come first on the timestamp index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    index: IndexName,
    lower: Option<IndexKey>,
    upper: Option<IndexKey>,
    direction: Direction,
}

impl IndexQuery {
    /// Creates an unbounded, descending query over `index`.
    pub fn new(index: IndexName) -> Self {
        Self {
            index,
            lower: None,
            upper: None,
            direction: Direction::Prev,
        }
    }

    /// Target index.
    pub fn index(&self) -> IndexName {
        self.index
    }

    /// Sets both bounds to `value`, selecting a single key.
    pub fn set_filter_value(&mut self, value: impl Into<IndexKey>) -> &mut Self {
        let value = value.into();
        self.lower = Some(value.clone());
        self.upper = Some(value);
        self
    }

    /// Sets the inclusive lower bound.
    pub fn set_lower(&mut self, value: impl Into<IndexKey>) -> &mut Self {
        self.lower = Some(value.into());
        self
    }

    /// Sets the inclusive upper bound.
    pub fn set_upper(&mut self, value: impl Into<IndexKey>) -> &mut Self {
        self.upper = Some(value.into());
        self
    }

    /// Current lower bound.
    pub fn lower(&self) -> Option<&IndexKey> {
        self.lower.as_ref()
    }

    /// Current upper bound.
    pub fn upper(&self) -> Option<&IndexKey> {
        self.upper.as_ref()
    }

    /// Flips between ascending and descending order.
    pub fn invert_order(&mut self) -> &mut Self {
        self.direction = self.direction.flipped();
        self
    }

    /// Scan direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Resolves the bounds into a [`KeyRange`].
    pub fn key_range(&self) -> Result<KeyRange, LogError> {
        match (&self.lower, &self.upper) {
            (None, None) => Ok(KeyRange::All),
            (Some(lower), Some(upper)) if lower == upper => Ok(KeyRange::Only(lower.clone())),
            (Some(lower), Some(upper)) if lower > upper => Err(LogError::InvalidKeyRange {
                lower: lower.clone(),
                upper: upper.clone(),
            }),
            (Some(lower), Some(upper)) => Ok(KeyRange::Bound {
                lower: lower.clone(),
                upper: upper.clone(),
            }),
            (None, Some(upper)) => Ok(KeyRange::UpperBound(upper.clone())),
            (Some(lower), None) => Ok(KeyRange::LowerBound(lower.clone())),
        }
    }
}
