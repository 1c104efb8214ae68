//! SingleStore MCP Server binary

use singlestore_mcp::SingleStoreMcpServer;

mcp_common::serve_stdio!(SingleStoreMcpServer::from_env, "singlestore_mcp");
