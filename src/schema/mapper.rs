//! Native type name mapping

use crate::error::Result;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// How the server projects `VECTOR` columns for the current session
///
/// Read from `@@vector_type_project_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VectorFormat {
    /// Packed little-endian elements
    Binary,
    /// JSON array text
    Json,
}

impl VectorFormat {
    /// Interpret the session setting; anything but `BINARY` projects as JSON
    pub fn from_setting(value: &str) -> Self {
        if value == "BINARY" {
            VectorFormat::Binary
        } else {
            VectorFormat::Json
        }
    }

    /// Canonical kind of a vector column under this format
    pub fn data_type(self) -> DataType {
        match self {
            VectorFormat::Binary => DataType::Binary,
            VectorFormat::Json => DataType::Json,
        }
    }
}

/// Outcome of looking up a native type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    /// Fixed mapping
    Known(DataType),
    /// Depends on [`VectorFormat`]
    Vector,
}

impl NativeType {
    /// Resolve to a canonical kind, consulting the vector format only when needed
    pub async fn resolve<F, Fut>(self, vector_format: F) -> Result<DataType>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VectorFormat>>,
    {
        match self {
            NativeType::Known(kind) => Ok(kind),
            NativeType::Vector => Ok(vector_format().await?.data_type()),
        }
    }
}

/// Map an upper-case native type name to its canonical kind.
///
/// Unknown names map to [`DataType::Unspecified`] rather than failing.
pub fn map_native_type(type_name: &str) -> NativeType {
    let kind = match type_name {
        "BOOLEAN" => DataType::Bool,
        "TINYINT" | "SMALLINT" => DataType::Short,
        "MEDIUMINT" | "INT" => DataType::Int,
        "BIGINT" => DataType::Long,
        "FLOAT" => DataType::Float,
        "DOUBLE" => DataType::Double,
        "DECIMAL" => DataType::Decimal,
        "DATE" | "YEAR" => DataType::Date,
        "DATETIME" | "TIME" | "TIMESTAMP" => DataType::DateTime,
        "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "MEDIUMBLOB" | "BLOB" | "LONGBLOB"
        | "BSON" => DataType::Binary,
        "CHAR" | "VARCHAR" | "TINYTEXT" | "MEDIUMTEXT" | "TEXT" | "LONGTEXT"
        | "GEOGRAPHYPOINT" | "GEOGRAPHY" | "ENUM" | "SET" => DataType::String,
        "JSON" => DataType::Json,
        "VECTOR" => return NativeType::Vector,
        _ => DataType::Unspecified,
    };
    NativeType::Known(kind)
}
