//! Table schema module
//!
//! Column metadata resolved from live introspection and the mapping from
//! native SingleStore type names to canonical kinds.
//!
//! # Overview
//!
//! - `Column` / `Table` / `Schema` / `SchemaList` - discovered structure
//! - `map_native_type` - fixed type-name table
//! - `VectorFormat` - session setting that decides how `VECTOR` columns project

mod mapper;
mod types;

pub use mapper::{map_native_type, NativeType, VectorFormat};
pub use types::{Column, Schema, SchemaList, Table, SYNTHETIC_KEY_COLUMN};
