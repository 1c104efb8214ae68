//! In-process tool execution
//!
//! [`EmbeddableMcp`] lets a host call a server's tools directly, without a
//! stdio transport in between. The same tool code runs either way.
//!
//! ```rust,ignore
//! use mcp_common::EmbeddableMcp;
//! use singlestore_mcp::SingleStoreMcpServer;
//!
//! let server = SingleStoreMcpServer::from_env()?;
//! let result = server
//!     .call_tool("execute_sql", serde_json::json!({ "query": "SELECT 1" }))
//!     .await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

/// Error type for embedded tool calls
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments did not match the tool's input schema
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The tool answered with a protocol error
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

impl From<serde_json::Error> for EmbeddableError {
    fn from(err: serde_json::Error) -> Self {
        EmbeddableError::InvalidParams(err.to_string())
    }
}

/// Result type for embedded tool calls
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// An MCP server whose tools can be called in-process
///
/// Implementations must be `Send + Sync`; hosts may issue calls from
/// several tasks at once.
///
/// Servers built with `#[tool_router]` list their tools through the router
/// and dispatch `call_tool` to the same methods the router uses.
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Name used to identify the server in host configuration
    fn server_name(&self) -> &str;

    /// All tools with their input schemas
    fn list_tools(&self) -> Vec<Tool>;

    /// Call a tool by name
    ///
    /// Failures the tool reports to the caller (for example a rejected SQL
    /// statement) come back as `Ok` with `is_error` set; `Err` is reserved
    /// for unknown tools, bad arguments, and protocol errors.
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }

    fn server_version(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::text_success;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct EchoParams {
        text: String,
    }

    struct EchoServer;

    #[async_trait]
    impl EmbeddableMcp for EchoServer {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![]
        }

        async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
            match name {
                "echo" => {
                    let params: EchoParams = serde_json::from_value(params)?;
                    Ok(text_success(params.text))
                }
                other => Err(EmbeddableError::ToolNotFound(other.to_string())),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let server = EchoServer;
        assert_eq!(server.server_name(), "echo");
        assert!(server.server_description().is_none());
        assert!(server.server_version().is_none());
    }

    #[test]
    fn test_call_tool() {
        let result = tokio_test::block_on(EchoServer.call_tool("echo", serde_json::json!({ "text": "hi" })));
        assert!(!result.unwrap().is_error.unwrap_or(false));
    }

    #[test]
    fn test_bad_params_are_invalid_params() {
        let result = tokio_test::block_on(EchoServer.call_tool("echo", serde_json::json!({ "txt": "hi" })));
        assert!(matches!(result, Err(EmbeddableError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let result = EchoServer.call_tool("unknown", serde_json::json!({})).await;
        assert!(matches!(result, Err(EmbeddableError::ToolNotFound(_))));
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: EmbeddableError = rmcp::ErrorData::invalid_params("query must not be empty", None).into();
        assert!(err.to_string().contains("query must not be empty"));
    }
}
