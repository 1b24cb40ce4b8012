//! Offset state for resuming a change stream
//!
//! Serialized as `{"offsets":[token_or_null, ...]}` in partition order and
//! persisted between runs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-partition resume tokens
///
/// The number of partitions is fixed when the state is created and never
/// changes afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    offsets: Vec<Option<String>>,
}

impl State {
    /// Create a fresh state with no tokens for `partitions` partitions
    pub fn new(partitions: usize) -> Self {
        Self {
            offsets: vec![None; partitions],
        }
    }

    /// Build a state from explicit tokens
    pub fn from_offsets(offsets: Vec<Option<String>>) -> Self {
        Self { offsets }
    }

    /// Parse a previously serialized state document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::format(e.to_string()))
    }

    /// Parse a prior state document as sent by a caller.
    ///
    /// Blank input and the empty object `{}` mean "no prior state".
    pub fn from_prior_json(json: Option<&str>) -> Result<Option<Self>> {
        match json.map(str::trim) {
            None | Some("" | "{}") => Ok(None),
            Some(json) => Self::from_json(json).map(Some),
        }
    }

    /// Serialize to the canonical compact document
    pub fn to_json(&self) -> String {
        serde_json::json!({ "offsets": self.offsets }).to_string()
    }

    /// Render tokens as a SQL literal list for `BEGIN AT (...)`
    ///
    /// Absent tokens render as `NULL`; present tokens as quoted strings with
    /// internal quotes doubled.
    pub fn offsets_as_sql(&self) -> String {
        self.offsets
            .iter()
            .map(|offset| match offset {
                None => "NULL".to_string(),
                Some(token) => format!("'{}'", token.replace('\'', "''")),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Set the token for a partition.
    ///
    /// # Panics
    ///
    /// Panics if `partition` is out of range; callers validate partition ids
    /// reported by the source before advancing.
    pub fn set_offset(&mut self, partition: usize, offset: impl Into<String>) {
        assert!(
            partition < self.offsets.len(),
            "partition {partition} out of range for state with {} partitions",
            self.offsets.len()
        );
        self.offsets[partition] = Some(offset.into());
    }

    /// Token for a partition, if any
    pub fn offset(&self, partition: usize) -> Option<&str> {
        self.offsets.get(partition)?.as_deref()
    }

    /// All tokens in partition order
    pub fn offsets(&self) -> &[Option<String>] {
        &self.offsets
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the state tracks zero partitions
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
