//! Schema types

use crate::value::{DataType, DecimalParams};
use serde::{Deserialize, Serialize};

/// Name of the identity column added when a selection carries no primary key.
///
/// Matches the row identifier column the change stream reports for every event.
pub const SYNTHETIC_KEY_COLUMN: &str = "InternalId";

/// A table column as resolved once per sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Case-sensitive name as stored
    pub name: String,

    /// Canonical kind
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Precision and scale, only for decimal columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<DecimalParams>,

    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    /// Create a non-key column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            decimal: None,
            primary_key: false,
        }
    }

    /// The synthetic identity column
    pub fn synthetic_key() -> Self {
        Self::new(SYNTHETIC_KEY_COLUMN, DataType::Long).with_primary_key(true)
    }

    /// Set decimal precision and scale
    #[must_use]
    pub fn with_decimal(mut self, precision: u32, scale: u32) -> Self {
        self.decimal = Some(DecimalParams::new(precision, scale));
        self
    }

    /// Mark as primary key column
    #[must_use]
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }
}

/// A table and its ordered columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns flagged as primary key, in table order
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

/// A database and the tables discovered in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
}

/// Result of schema discovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaList {
    pub schemas: Vec<Schema>,
}

impl SchemaList {
    /// A schema list holding exactly one table
    pub fn single(database: impl Into<String>, table: Table) -> Self {
        Self {
            schemas: vec![Schema {
                name: database.into(),
                tables: vec![table],
            }],
        }
    }

    /// Find a table by schema and table name
    pub fn table(&self, schema: &str, table: &str) -> Option<&Table> {
        self.schemas
            .iter()
            .find(|s| s.name == schema)?
            .tables
            .iter()
            .find(|t| t.name == table)
    }
}
