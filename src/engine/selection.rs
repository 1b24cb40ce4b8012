//! Column selection
//!
//! Reduces a schema/table/column selection document to the set of columns
//! to read from one table.

use crate::database::TableRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Selection document sent with a sync request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// `None` selects everything
    #[serde(default)]
    pub schemas: Option<Vec<SchemaSelection>>,
}

/// Selection of tables within a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSelection {
    pub schema_name: String,
    #[serde(default)]
    pub included: bool,
    #[serde(default)]
    pub tables: Vec<TableSelection>,
}

/// Selection of columns within a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelection {
    pub table_name: String,
    #[serde(default)]
    pub included: bool,
    #[serde(default)]
    pub columns: BTreeMap<String, bool>,
}

impl Selection {
    /// Select exactly the given columns of one table
    pub fn columns<I, S>(table: &TableRef, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemas: Some(vec![SchemaSelection {
                schema_name: table.database.clone(),
                included: true,
                tables: vec![TableSelection {
                    table_name: table.table.clone(),
                    included: true,
                    columns: columns.into_iter().map(|c| (c.into(), true)).collect(),
                }],
            }]),
        }
    }
}

/// Columns to read from `table`.
///
/// `None` means all columns. An empty set means the table is not selected
/// and only key identity is read.
pub fn selected_columns(selection: Option<&Selection>, table: &TableRef) -> Option<HashSet<String>> {
    let schemas = selection?.schemas.as_ref()?;

    let selected = schemas
        .iter()
        .filter(|s| s.included && s.schema_name == table.database)
        .flat_map(|s| &s.tables)
        .find(|t| t.included && t.table_name == table.table)
        .map(|t| {
            t.columns
                .iter()
                .filter(|(_, selected)| **selected)
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();

    Some(selected)
}
