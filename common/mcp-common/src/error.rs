//! Error handling utilities for MCP servers
//!
//! Domain errors implement [`IntoMcpError`] to choose their protocol error
//! code; [`ResultExt::to_mcp_err`] applies the conversion at call sites.

use rmcp::ErrorData as McpError;

/// Type alias for MCP handler results
pub type McpResult<T> = Result<T, McpError>;

/// Conversion of a domain error into an MCP error
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::{IntoMcpError, McpError};
///
/// impl IntoMcpError for TableError {
///     fn into_mcp_error(self) -> McpError {
///         match self {
///             TableError::Missing(uri) => McpError::resource_not_found(uri, None),
///             other => McpError::internal_error(other.to_string(), None),
///         }
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::invalid_params(format!("JSON error: {}", self), None)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

/// Extension trait adding `to_mcp_err()` to results
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::ResultExt;
///
/// fn parse(&self, raw: &str) -> Result<CallToolResult, McpError> {
///     let value: serde_json::Value = serde_json::from_str(raw).to_mcp_err()?;
///     // ...
/// }
/// ```
pub trait ResultExt<T> {
    /// Convert the error to an MCP error
    fn to_mcp_err(self) -> McpResult<T>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> McpResult<T> {
        self.map_err(IntoMcpError::into_mcp_error)
    }
}

/// Internal error with a message
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::internal_error;
///
/// let handle = tokio::spawn(work);
/// let output = handle.await.map_err(|e| internal_error(format!("task failed: {}", e)))?;
/// ```
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Invalid params error with a message
///
/// Use this when a request is rejected before any work is done.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::invalid_params;
///
/// if query.trim().is_empty() {
///     return Err(invalid_params("query must not be empty"));
/// }
/// ```
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}
