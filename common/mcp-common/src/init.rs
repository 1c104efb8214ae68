//! Server initialization utilities
//!
//! Tracing setup and the `serve_stdio!` macro shared by MCP server binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Whether a `LOG_FORMAT` value asks for JSON lines
pub fn wants_json(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// Initialize tracing for an MCP server
///
/// Logs go to stderr because stdout carries the MCP protocol. `RUST_LOG`
/// directives are honored on top of a default `info` level for
/// `crate_name`; `LOG_FORMAT=json` switches to structured JSON lines.
///
/// # Example
///
/// ```rust,ignore
/// mcp_common::init_tracing("singlestore_mcp")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Generate `main` for an MCP server served over stdio
///
/// The constructor is fallible and runs before the transport starts, so a
/// misconfigured server exits with a descriptive error instead of serving
/// requests it cannot answer.
///
/// # Arguments
///
/// * `$constructor` - Path to a `fn() -> Result<Server, E>` where `E` converts into `anyhow::Error`
/// * `$crate_name` - String literal for the crate name (used in logging)
///
/// # Example
///
/// ```rust,ignore
/// use singlestore_mcp::SingleStoreMcpServer;
///
/// mcp_common::serve_stdio!(SingleStoreMcpServer::from_env, "singlestore_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($constructor:path, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = match $constructor() {
                Ok(server) => server,
                Err(e) => {
                    tracing::error!(error = %e, "Startup failed");
                    return Err(e.into());
                }
            };
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // The subscriber itself can only be installed once per process,
    // so only the format selection is covered here.
    #[test]
    fn test_wants_json() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some(" JSON ")));
        assert!(!wants_json(Some("text")));
        assert!(!wants_json(None));
    }
}
