//! Error types for SingleStore operations
//!
//! Driver failures are split into connection-level and statement-level
//! errors. Statement errors keep the server's error number, SQLSTATE and
//! message text exactly as reported.

use mcp_common::{IntoMcpError, McpError};
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::fmt;
use thiserror::Error;

/// MySQL/SingleStore error number for "Table doesn't exist"
pub const ER_NO_SUCH_TABLE: u16 = 1146;

/// Errors surfaced by the SingleStore server
#[derive(Error, Debug)]
pub enum SingleStoreError {
    /// Missing or invalid environment configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Database unreachable or session lost after the reconnect attempt
    #[error("connection error: {0}")]
    Connection(String),

    /// Resource URI could not be parsed
    #[error("invalid resource URI '{uri}': {reason}")]
    InvalidResource { uri: String, reason: String },

    /// Resource URI names a table that does not exist
    #[error("resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// Statement failed; carries the driver's error verbatim
    #[error("{0}")]
    Query(DriverError),
}

/// Result type alias for SingleStore operations
pub type SingleStoreResult<T> = Result<T, SingleStoreError>;

/// Statement failure as reported by the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Server error number (e.g. 1064)
    pub code: Option<u16>,
    /// SQLSTATE (e.g. 42000)
    pub sqlstate: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sqlstate: None,
            message: message.into(),
        }
    }
}

// Same layout as the mysql command line client
impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, &self.sqlstate) {
            (Some(code), Some(state)) => write!(f, "ERROR {} ({}): {}", code, state, self.message),
            (Some(code), None) => write!(f, "ERROR {}: {}", code, self.message),
            (None, _) => f.write_str(&self.message),
        }
    }
}

impl SingleStoreError {
    /// Classify a driver error
    pub fn from_driver(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db.try_downcast_ref::<MySqlDatabaseError>().map(|e| e.number());
                SingleStoreError::Query(DriverError {
                    code,
                    sqlstate: db.code().map(|c| c.into_owned()),
                    message: db.message().to_string(),
                })
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => SingleStoreError::Connection(err.to_string()),
            other => SingleStoreError::Query(DriverError::message(other.to_string())),
        }
    }

    /// Whether the session should be considered lost
    pub fn is_connection(&self) -> bool {
        matches!(self, SingleStoreError::Connection(_))
    }

    /// Whether the server reported a missing table
    pub fn is_missing_table(&self) -> bool {
        matches!(self, SingleStoreError::Query(e) if e.code == Some(ER_NO_SUCH_TABLE))
    }

    pub(crate) fn invalid_resource(uri: &str, reason: impl Into<String>) -> Self {
        SingleStoreError::InvalidResource {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}

impl IntoMcpError for SingleStoreError {
    fn into_mcp_error(self) -> McpError {
        match self {
            SingleStoreError::InvalidResource { .. } => McpError::invalid_params(self.to_string(), None),
            SingleStoreError::ResourceNotFound { ref uri } => {
                let data = json!({ "uri": uri });
                McpError::resource_not_found(self.to_string(), Some(data))
            }
            SingleStoreError::Query(ref driver) => {
                let data = json!({ "code": driver.code, "sqlstate": driver.sqlstate });
                McpError::internal_error(self.to_string(), Some(data))
            }
            SingleStoreError::Configuration(_) | SingleStoreError::Connection(_) => {
                McpError::internal_error(self.to_string(), None)
            }
        }
    }
}

impl From<SingleStoreError> for McpError {
    fn from(e: SingleStoreError) -> Self {
        e.into_mcp_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn test_driver_error_display_matches_client() {
        let err = DriverError {
            code: Some(1064),
            sqlstate: Some("42000".to_string()),
            message: "You have an error in your SQL syntax".to_string(),
        };
        assert_eq!(err.to_string(), "ERROR 1064 (42000): You have an error in your SQL syntax");
        assert_eq!(DriverError::message("boom").to_string(), "boom");
    }

    #[test]
    fn test_query_error_display_is_verbatim() {
        let err = SingleStoreError::Query(DriverError {
            code: Some(ER_NO_SUCH_TABLE),
            sqlstate: Some("42S02".to_string()),
            message: "Table 'db.nope' doesn't exist".to_string(),
        });
        assert_eq!(err.to_string(), "ERROR 1146 (42S02): Table 'db.nope' doesn't exist");
        assert!(err.is_missing_table());
        assert!(!err.is_connection());
    }

    #[test]
    fn test_io_errors_are_connection_level() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = SingleStoreError::from_driver(sqlx::Error::Io(io));
        assert!(err.is_connection());
    }

    #[test]
    fn test_decode_errors_are_query_level() {
        let err = SingleStoreError::from_driver(sqlx::Error::ColumnNotFound("x".to_string()));
        assert!(matches!(err, SingleStoreError::Query(_)));
    }

    #[test]
    fn test_mcp_error_codes() {
        let invalid = SingleStoreError::invalid_resource("mysql://t", "bad scheme").into_mcp_error();
        assert_eq!(invalid.code, ErrorCode::INVALID_PARAMS);

        let missing = SingleStoreError::ResourceNotFound {
            uri: "singlestore://nope".to_string(),
        }
        .into_mcp_error();
        assert_eq!(missing.code, ErrorCode::RESOURCE_NOT_FOUND);

        let query = SingleStoreError::Query(DriverError::message("bad")).into_mcp_error();
        assert_eq!(query.code, ErrorCode::INTERNAL_ERROR);
        assert!(query.message.contains("bad"));
    }
}
