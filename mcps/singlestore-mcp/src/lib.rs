//! SingleStore MCP Server - database tables and SQL over MCP
//!
//! Exposes the tables of one SingleStore database as `singlestore://<table>`
//! resources and provides an `execute_sql` tool. Results are rendered as
//! plain text tables after normalizing driver values (JSON and BSON columns
//! included) into a small set of portable kinds.
//!
//! Configuration comes from `SINGLESTORE_HOST`, `SINGLESTORE_PORT`,
//! `SINGLESTORE_USER`, `SINGLESTORE_PASSWORD` and `SINGLESTORE_DATABASE`.

pub mod config;
pub mod connection;
pub mod error;
pub mod normalize;
pub mod query;
pub mod resources;
pub mod server;
pub mod table;

pub use config::SingleStoreConfig;
pub use connection::ConnectionManager;
pub use error::{SingleStoreError, SingleStoreResult};
pub use normalize::{ColumnKind, NormalizedValue};
pub use query::{AffectedRows, QueryResult};
pub use resources::ResourceDescriptor;
pub use server::SingleStoreMcpServer;
pub use table::RowSet;
