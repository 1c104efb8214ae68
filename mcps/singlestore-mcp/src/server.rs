//! SingleStore MCP Server implementation

use crate::config::SingleStoreConfig;
use crate::connection::ConnectionManager;
use crate::error::{SingleStoreError, SingleStoreResult};
use crate::{query, resources};
use mcp_common::{
    async_trait, internal_error, invalid_params, text_failure, text_success, EmbeddableError,
    EmbeddableMcp, EmbeddableResult, IntoMcpError, McpError, ResultExt,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, Implementation, ListResourcesResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents, ServerCapabilities,
        ServerInfo, Tool,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Name of the SQL tool
pub const EXECUTE_SQL_TOOL: &str = "execute_sql";

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for execute_sql tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteSqlParams {
    /// SQL statement to execute verbatim against the configured database
    pub query: String,
    /// Values for `?` placeholders, in order; the statement is prepared when present
    #[serde(default)]
    pub parameters: Option<Vec<Value>>,
}

// ============================================================================
// Server Implementation
// ============================================================================

/// SingleStore MCP Server
#[derive(Clone)]
pub struct SingleStoreMcpServer {
    connections: Arc<ConnectionManager>,
    database: String,
    tool_router: ToolRouter<Self>,
}

impl SingleStoreMcpServer {
    /// Create a server from `SINGLESTORE_*` environment variables
    pub fn from_env() -> SingleStoreResult<Self> {
        let config = SingleStoreConfig::from_env()?;
        tracing::info!(?config, "Loaded SingleStore configuration");
        Ok(Self::new(config))
    }

    /// Create a server; the database session opens on first request
    pub fn new(config: SingleStoreConfig) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(&config)),
            database: config.database,
            tool_router: Self::tool_router(),
        }
    }

    /// The shared connection manager
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    async fn run_sql(&self, params: ExecuteSqlParams) -> Result<CallToolResult, McpError> {
        let ExecuteSqlParams { query, parameters } = params;
        if query.trim().is_empty() {
            return Err(invalid_params("query must not be empty"));
        }
        let parameters = parameters.unwrap_or_default();

        let connections = Arc::clone(&self.connections);
        let outcome =
            detached(async move { query::execute_query_with(&connections, &query, &parameters).await }).await?;

        match outcome {
            Ok(result) => Ok(text_success(result.render())),
            // The assistant needs the server's own error text to fix its SQL
            Err(SingleStoreError::Query(driver)) => Ok(text_failure(driver.to_string())),
            Err(e) => Err(e.into_mcp_error()),
        }
    }
}

/// Run database work on its own task so a cancelled request does not abort
/// a statement mid-flight; the result is simply dropped.
async fn detached<F, T>(work: F) -> Result<T, McpError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| internal_error(format!("database task failed: {}", e)))
}

fn to_resource(descriptor: &resources::ResourceDescriptor) -> Resource {
    let mut raw = RawResource::new(descriptor.uri.clone(), descriptor.name.clone());
    raw.description = Some(descriptor.description());
    raw.mime_type = Some(descriptor.mime_type.to_string());
    raw.no_annotation()
}

#[tool_router]
impl SingleStoreMcpServer {
    /// Execute a SQL statement and return the result as a text table
    #[tool(description = "Execute a SQL statement against the SingleStore database. Queries return a text table \
        (header, rows, row count); other statements return the affected row count. Optional `parameters` \
        bind `?` placeholders in order. Database errors are returned verbatim.")]
    async fn execute_sql(&self, Parameters(params): Parameters<ExecuteSqlParams>) -> Result<CallToolResult, McpError> {
        self.run_sql(params).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SingleStoreMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "SingleStore database MCP server for database '{}'. \
                Tables are listed as resources ({}<table>); reading one returns up to {} rows. \
                Use {} to run arbitrary SQL.",
                self.database,
                resources::URI_SCHEME,
                resources::READ_ROW_LIMIT,
                EXECUTE_SQL_TOOL
            )),
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let connections = Arc::clone(&self.connections);
        let descriptors = detached(async move { resources::list_resources(&connections).await })
            .await?
            .to_mcp_err()?;

        Ok(ListResourcesResult::with_all_items(
            descriptors.iter().map(to_resource).collect(),
        ))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let connections = Arc::clone(&self.connections);
        let uri = request.uri.clone();
        let text = detached(async move { resources::read_resource(&connections, &uri).await })
            .await?
            .to_mcp_err()?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

#[async_trait]
impl EmbeddableMcp for SingleStoreMcpServer {
    fn server_name(&self) -> &str {
        "singlestore"
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            EXECUTE_SQL_TOOL => {
                let params: ExecuteSqlParams = serde_json::from_value(params)?;
                Ok(self.run_sql(params).await?)
            }
            other => Err(EmbeddableError::ToolNotFound(other.to_string())),
        }
    }

    fn server_description(&self) -> Option<&str> {
        Some("SingleStore tables as resources and SQL execution")
    }

    fn server_version(&self) -> Option<&str> {
        Some(env!("CARGO_PKG_VERSION"))
    }
}
