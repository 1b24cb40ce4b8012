//! Error types for the SingleStore change-stream connector
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Message attached to [`Error::StaleOffset`].
pub const STALE_OFFSET_MESSAGE: &str = "The offset the connector is trying to resume from is considered stale.\n\
Therefore, the connector cannot resume streaming.\n\
The only way to recover is to re-sync all historical data.\n\
To help prevent failures related to stale offsets in future, you can increase the value of the following engine variables in SingleStore:\n\
 * 'snapshots_to_keep' - Defines the number of snapshots to keep for backup and replication;\n\
 * 'snapshot_trigger_size' - Defines the size of transaction logs in bytes, which, when reached, triggers a snapshot that is written to disk.\n\
You may also consider decreasing the sync frequency.";

/// Server message fragment that identifies a stale resume position.
const STALE_OFFSET_MARKER: &str = "The requested Offset is too stale";

/// The main error type for the connector
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Table {table} not found")]
    TableNotFound { table: String },

    #[error("Schema error: {message}")]
    Schema { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("Invalid state document: {message}")]
    Format { message: String },

    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Stream Errors
    // ============================================================================
    #[error("{}\nCause: {cause}", STALE_OFFSET_MESSAGE)]
    StaleOffset { cause: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Database error: {0}")]
    Database(#[from] mysql_async::Error),

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a state document format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a decode error for a column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Classify a driver error.
    ///
    /// Server errors reporting a resume position outside the retained
    /// history become [`Error::StaleOffset`]; transport failures become
    /// [`Error::Connection`].
    pub fn from_driver(err: mysql_async::Error) -> Self {
        let text = err.to_string();
        if text.contains(STALE_OFFSET_MARKER) {
            return Self::StaleOffset { cause: text };
        }
        match err {
            mysql_async::Error::Io(e) => Self::connection(e.to_string()),
            mysql_async::Error::Driver(e) => Self::connection(e.to_string()),
            other => Self::Database(other),
        }
    }

    /// Check if this error is retryable by re-invoking the sync
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::Io(_))
    }

    /// Whether this error should be reported as a schema discovery failure
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Error::TableNotFound { .. } | Error::Schema { .. })
    }

    /// Whether the resume position is gone and a full re-sync is required
    pub fn is_stale_offset(&self) -> bool {
        matches!(self, Error::StaleOffset { .. })
    }
}

/// Result type alias for the connector
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("host");
        assert_eq!(err.to_string(), "Missing required config field: host");

        let err = Error::decode("a", "not a number");
        assert_eq!(err.to_string(), "Failed to decode column 'a': not a number");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::connection("reset by peer").is_retryable());
        assert!(Error::Io(std::io::Error::other("broken pipe")).is_retryable());

        assert!(!Error::config("test").is_retryable());
        assert!(!Error::format("bad").is_retryable());
        assert!(!Error::StaleOffset {
            cause: "too old".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_discovery_failure() {
        assert!(Error::TableNotFound {
            table: "`db`.`t`".to_string()
        }
        .is_discovery_failure());
        assert!(Error::schema("no columns").is_discovery_failure());
        assert!(!Error::connection("down").is_discovery_failure());
    }

    #[test]
    fn test_stale_offset_message_is_actionable() {
        let err = Error::StaleOffset {
            cause: "The requested Offset is too stale".to_string(),
        };
        assert!(err.is_stale_offset());
        let text = err.to_string();
        assert!(text.contains("re-sync all historical data"));
        assert!(text.contains("snapshots_to_keep"));
    }

    #[test]
    fn test_from_driver_classifies_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::from_driver(mysql_async::Error::Io(io.into()));
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[test]
    fn test_from_driver_detects_stale_offset() {
        let server = mysql_async::ServerError {
            code: 2374,
            message: "The requested Offset is too stale. Please re-start the OBSERVE query".into(),
            state: "HY000".into(),
        };
        let err = Error::from_driver(mysql_async::Error::Server(server));
        assert!(err.is_stale_offset());
        assert!(!err.is_retryable());

        let server = mysql_async::ServerError {
            code: 1146,
            message: "Table 'db.t' doesn't exist".into(),
            state: "42S02".into(),
        };
        assert!(matches!(
            Error::from_driver(mysql_async::Error::Server(server)),
            Error::Database(_)
        ));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
