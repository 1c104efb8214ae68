//! MCP Common - Shared plumbing for MCP servers
//!
//! - **Initialization**: `serve_stdio!` macro and [`init_tracing`]
//! - **Results**: helpers for building `CallToolResult` responses
//! - **Errors**: [`IntoMcpError`] for mapping domain errors onto protocol errors
//! - **Embeddable**: [`EmbeddableMcp`] for in-process tool calls
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, text_success};
//!
//! // main.rs
//! serve_stdio!(SingleStoreMcpServer::from_env, "singlestore_mcp");
//!
//! // In a tool
//! Ok(text_success(result.render()))
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;

pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{internal_error, invalid_params, IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use result::{text_failure, text_success};

pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
