//! Tables as MCP resources
//!
//! Every table of the configured database is addressable as
//! `singlestore://<table>`. Reading a resource returns at most
//! [`READ_ROW_LIMIT`] rows rendered as a text table.

use crate::connection::ConnectionManager;
use crate::error::{SingleStoreError, SingleStoreResult};
use crate::query::{run_statement, QueryResult};
use crate::table::RowSet;
use sqlx::mysql::MySqlConnection;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// URI scheme prefix for table resources
pub const URI_SCHEME: &str = "singlestore://";

/// Rows returned by a resource read
pub const READ_ROW_LIMIT: usize = 100;

/// Mime type of resource contents
pub const RESOURCE_MIME_TYPE: &str = "text/plain";

const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME, TABLE_TYPE, TABLE_COMMENT, CAST(CREATE_TIME AS CHAR) \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() \
     ORDER BY TABLE_NAME";

const TABLE_COLUMNS_SQL: &str = "SELECT COLUMN_NAME, DATA_TYPE \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// A table exposed as a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub mime_type: &'static str,
    /// `BASE TABLE`, `VIEW`, ...
    pub table_type: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<String>,
}

impl ResourceDescriptor {
    fn for_table(name: String) -> Self {
        Self {
            uri: table_uri(&name),
            name,
            mime_type: RESOURCE_MIME_TYPE,
            table_type: None,
            comment: None,
            created_at: None,
        }
    }

    /// Human readable summary of the table attributes
    pub fn description(&self) -> String {
        let kind = match self.table_type.as_deref() {
            Some("VIEW") => "View",
            _ => "Table",
        };
        let mut out = format!("{} {}", kind, self.name);
        if let Some(comment) = &self.comment {
            out.push_str(&format!(": {}", comment));
        }
        if let Some(created) = &self.created_at {
            out.push_str(&format!(" (created {})", created));
        }
        out
    }
}

/// URI of a table resource
pub fn table_uri(table: &str) -> String {
    format!("{}{}", URI_SCHEME, table)
}

/// Table name of a `singlestore://<table>` URI
pub fn parse_table_uri(uri: &str) -> SingleStoreResult<String> {
    let table = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| SingleStoreError::invalid_resource(uri, format!("expected {}<table>", URI_SCHEME)))?;

    if table.is_empty() {
        return Err(SingleStoreError::invalid_resource(uri, "missing table name"));
    }
    if table.contains('/') {
        return Err(SingleStoreError::invalid_resource(uri, "table name must not contain '/'"));
    }
    if table.chars().any(|c| c.is_control()) {
        return Err(SingleStoreError::invalid_resource(uri, "table name contains control characters"));
    }

    Ok(table.to_string())
}

/// Backtick-quote an identifier
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// List the tables of the configured database, sorted by name
pub async fn list_resources(connections: &ConnectionManager) -> SingleStoreResult<Vec<ResourceDescriptor>> {
    let mut guard = connections.acquire().await;
    let conn = guard.connection().await?;

    let result = sqlx::query(LIST_TABLES_SQL)
        .fetch_all(&mut *conn)
        .await
        .map_err(SingleStoreError::from_driver);

    let rows = match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "Listing tables failed");
            guard.invalidate_on(&e);
            return Err(e);
        }
    };

    let mut resources: Vec<ResourceDescriptor> = rows
        .iter()
        .filter_map(|row| {
            let name = text_cell(row, 0)?;
            let mut descriptor = ResourceDescriptor::for_table(name);
            descriptor.table_type = text_cell(row, 1);
            descriptor.comment = text_cell(row, 2).filter(|c| !c.is_empty());
            descriptor.created_at = text_cell(row, 3);
            Some(descriptor)
        })
        .collect();

    // Server collation may not be byte order
    resources.sort_by(|a, b| a.name.cmp(&b.name));

    info!(tables = resources.len(), "Listed table resources");
    Ok(resources)
}

/// Read a table resource as rendered text
pub async fn read_resource(connections: &ConnectionManager, uri: &str) -> SingleStoreResult<String> {
    read_table(connections, uri).await.map(|set| set.render())
}

/// Read up to [`READ_ROW_LIMIT`] rows of the table named by `uri`
pub async fn read_table(connections: &ConnectionManager, uri: &str) -> SingleStoreResult<RowSet> {
    let table = parse_table_uri(uri)?;

    let mut guard = connections.acquire().await;
    let conn = guard.connection().await?;

    let result = read_table_on(conn, &table, uri).await;
    match &result {
        Ok(set) => info!(%uri, rows = set.row_count(), "Read table resource"),
        Err(e) => {
            warn!(%uri, error = %e, "Reading table resource failed");
            guard.invalidate_on(e);
        }
    }
    result
}

async fn read_table_on(conn: &mut MySqlConnection, table: &str, uri: &str) -> SingleStoreResult<RowSet> {
    let declared = declared_columns(conn, table).await?;
    if declared.is_empty() {
        return Err(SingleStoreError::ResourceNotFound { uri: uri.to_string() });
    }
    let names: Vec<String> = declared.iter().map(|(name, _)| name.clone()).collect();
    let hints: HashMap<String, String> = declared.into_iter().collect();

    let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), READ_ROW_LIMIT);
    debug!(%sql, "Reading table");

    match run_statement(conn, &sql, &[], &hints).await {
        Ok(QueryResult::Rows(set)) => Ok(limit_rows(set, names)),
        Ok(_) => Ok(RowSet::new(names)),
        // Dropped between the lookup and the select
        Err(e) if e.is_missing_table() => Err(SingleStoreError::ResourceNotFound { uri: uri.to_string() }),
        Err(e) => Err(e),
    }
}

/// Cap the rows; an empty read takes its header from the catalog
fn limit_rows(mut set: RowSet, declared_names: Vec<String>) -> RowSet {
    if set.rows.is_empty() {
        return RowSet::new(declared_names);
    }
    set.rows.truncate(READ_ROW_LIMIT);
    set
}

/// Declared column names and data types, in table order
async fn declared_columns(conn: &mut MySqlConnection, table: &str) -> SingleStoreResult<Vec<(String, String)>> {
    let rows = sqlx::query(TABLE_COLUMNS_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(SingleStoreError::from_driver)?;

    Ok(rows
        .iter()
        .filter_map(|row| Some((text_cell(row, 0)?, text_cell(row, 1).unwrap_or_default())))
        .collect())
}

// information_schema columns come back as VARBINARY on some servers,
// so skip the driver's type check and read the bytes as text
fn text_cell(row: &sqlx::mysql::MySqlRow, index: usize) -> Option<String> {
    row.try_get_unchecked::<Option<&[u8]>, _>(index)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizedValue;

    #[test]
    fn test_parse_table_uri() {
        assert_eq!(parse_table_uri("singlestore://users").unwrap(), "users");
        assert_eq!(parse_table_uri("singlestore://order items").unwrap(), "order items");
    }

    #[test]
    fn test_malformed_uris_rejected() {
        for uri in [
            "singlestore://",
            "mysql://users",
            "users",
            "singlestore://db/users",
            "singlestore://users/",
            "singlestore://bad\nname",
        ] {
            let err = parse_table_uri(uri).unwrap_err();
            assert!(matches!(err, SingleStoreError::InvalidResource { .. }), "uri {:?}", uri);
        }
    }

    #[test]
    fn test_uri_round_trip() {
        assert_eq!(parse_table_uri(&table_uri("events_2024")).unwrap(), "events_2024");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_empty_read_uses_catalog_header() {
        let stale = RowSet::new(vec!["old".to_string()]);
        let set = limit_rows(stale, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(set.columns, vec!["a", "b"]);
        assert_eq!(set.render(), "a | b\n--+--\n0 rows returned");
    }

    #[test]
    fn test_rows_capped_at_limit() {
        let mut set = RowSet::new(vec!["id".to_string()]);
        for i in 0..(READ_ROW_LIMIT as i128 + 5) {
            set.rows.push(vec![NormalizedValue::Integer(i)]);
        }
        let set = limit_rows(set, vec!["id".to_string()]);
        assert_eq!(set.row_count(), READ_ROW_LIMIT);
        assert_eq!(set.rows[0][0], NormalizedValue::Integer(0));
    }

    #[test]
    fn test_description() {
        let mut descriptor = ResourceDescriptor::for_table("users".to_string());
        assert_eq!(descriptor.uri, "singlestore://users");
        assert_eq!(descriptor.mime_type, "text/plain");
        assert_eq!(descriptor.description(), "Table users");

        descriptor.table_type = Some("VIEW".to_string());
        descriptor.comment = Some("active accounts".to_string());
        descriptor.created_at = Some("2024-03-20 10:00:00".to_string());
        assert_eq!(
            descriptor.description(),
            "View users: active accounts (created 2024-03-20 10:00:00)"
        );
    }
}
