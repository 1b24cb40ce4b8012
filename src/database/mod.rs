//! Database access
//!
//! The change-stream engine talks to the database through the
//! [`ChangeSource`] and [`ChangeCursor`] traits. [`SingleStoreConnection`]
//! implements them over the MySQL wire protocol.

mod connection;
mod cursor;
mod source;

pub use connection::{escape_identifier, escape_string, SingleStoreConnection};
pub use cursor::ObserveCursor;
pub use source::{
    ChangeCursor, ChangeSource, RawChangeRow, TableRef, OPERATION_DELETE, OPERATION_INSERT,
    OPERATION_UPDATE,
};
