//! Canonical value model
//!
//! Wire-safe value kinds that every source column decodes into.
//!
//! # Overview
//!
//! The value module provides:
//! - `DataType` - The canonical kind a native column type maps to
//! - `Value` - A decoded column value of one canonical kind
//! - `decode_value` - Typed decode from a native driver value
//! - `Row` - A decoded row keyed by column name

mod decode;
mod types;

pub use decode::decode_value;
pub use types::{DataType, DecimalParams, Row, Value};
