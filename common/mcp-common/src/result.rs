//! Result helpers for MCP tool responses
//!
//! Builds `CallToolResult` values so tools do not assemble content vectors
//! by hand.

use rmcp::model::{CallToolResult, Content};

/// Successful plain text tool result
///
/// # Arguments
///
/// * `text` - Any type that can be converted to a `String`
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::text_success;
///
/// fn row_count(&self) -> Result<CallToolResult, McpError> {
///     Ok(text_success("3 rows returned"))
/// }
/// ```
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Failed tool result carrying text for the model to read
///
/// Unlike a protocol error, this is delivered to the assistant as tool
/// output with `is_error` set, so it can react to the message.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::{text_failure, text_success};
///
/// match run(&sql).await {
///     Ok(table) => Ok(text_success(table)),
///     Err(e) => Ok(text_failure(e.to_string())),
/// }
/// ```
pub fn text_failure(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_success() {
        let result = text_success("1 row returned");
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_text_failure() {
        let result = text_failure("ERROR 1064 (42000): syntax error");
        assert!(result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }
}
