//! Statement execution
//!
//! Plain statements are sent verbatim over the text protocol; statements
//! with parameters are prepared and bound. Every statement in the text
//! yields one outcome. One that streams rows becomes a [`RowSet`]; one that
//! streams none is prepared (not executed again) to find out whether it has
//! result columns, which separates an empty `SELECT` from a mutation.

use crate::connection::ConnectionManager;
use crate::error::{SingleStoreError, SingleStoreResult};
use crate::normalize::{describe_columns, normalize_row, ColumnKind, WireFormat};
use crate::table::{row_count_footer, RowSet};
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, Statement};
use std::collections::HashMap;
use tracing::{info, warn};

/// Kind reported when the statement text cannot be matched to an outcome
const UNKNOWN_STATEMENT: &str = "STATEMENT";

/// Affected-row count of a statement without a result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedRows {
    /// Leading keyword, e.g. `UPDATE`
    pub statement: String,
    pub count: u64,
    /// Reported for inserts into tables with an auto-increment key
    pub last_insert_id: Option<u64>,
}

impl AffectedRows {
    pub fn render(&self) -> String {
        let mut out = format!("{} OK, {}", self.statement, row_count_footer(self.count, "affected"));
        if let Some(id) = self.last_insert_id {
            out.push_str(&format!(", last insert id {}", id));
        }
        out
    }
}

/// Outcome of a call
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(RowSet),
    Affected(AffectedRows),
    /// One outcome per statement of a multi-statement text, in order
    Batch(Vec<QueryResult>),
}

impl QueryResult {
    pub fn render(&self) -> String {
        match self {
            QueryResult::Rows(set) => set.render(),
            QueryResult::Affected(affected) => affected.render(),
            QueryResult::Batch(results) => results
                .iter()
                .map(QueryResult::render)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Execute `sql` on the shared session
pub async fn execute_query(connections: &ConnectionManager, sql: &str) -> SingleStoreResult<QueryResult> {
    execute_query_with(connections, sql, &[]).await
}

/// Execute `sql` with positional `?` parameters on the shared session
///
/// The session gets its one reconnect attempt inside
/// [`ConnectionGuard::connection`](crate::connection::ConnectionGuard::connection);
/// the statement itself runs exactly once.
pub async fn execute_query_with(
    connections: &ConnectionManager,
    sql: &str,
    params: &[Value],
) -> SingleStoreResult<QueryResult> {
    let statement = statement_kind(sql);
    let mut guard = connections.acquire().await;
    let conn = guard.connection().await?;

    let result = run_statement(conn, sql, params, &HashMap::new()).await;

    match &result {
        Ok(QueryResult::Rows(set)) => {
            info!(%statement, sql, params = params.len(), rows = set.row_count(), "Statement returned rows");
        }
        Ok(QueryResult::Affected(affected)) => {
            info!(%statement, sql, params = params.len(), affected = affected.count, "Statement completed");
        }
        Ok(QueryResult::Batch(results)) => {
            info!(%statement, sql, statements = results.len(), "Statements completed");
        }
        Err(e) => {
            warn!(%statement, sql, error = %e, "Statement failed");
            guard.invalidate_on(e);
        }
    }

    result
}

/// What one statement streamed back
struct Outcome {
    rows: Option<RowSet>,
    affected: u64,
    last_insert_id: u64,
}

/// Run `sql`, normalizing rows with optional declared column types
pub(crate) async fn run_statement(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Value],
    declared: &HashMap<String, String>,
) -> SingleStoreResult<QueryResult> {
    let format = if params.is_empty() {
        WireFormat::Text
    } else {
        WireFormat::Binary
    };
    let lookup = |name: &str| declared.get(name).cloned();
    let mut kinds: Vec<ColumnKind> = Vec::new();
    let mut current: Option<RowSet> = None;
    let mut outcomes: Vec<Outcome> = Vec::new();

    {
        let mut stream = match format {
            WireFormat::Text => (&mut *conn).fetch_many(sqlx::raw_sql(sql)),
            WireFormat::Binary => (&mut *conn).fetch_many(bind_parameters(sqlx::query(sql), params)),
        };
        while let Some(item) = stream.try_next().await.map_err(SingleStoreError::from_driver)? {
            match item {
                Either::Right(row) => {
                    let set = current.get_or_insert_with(|| {
                        let (columns, row_kinds) = describe_columns(&row, lookup);
                        kinds = row_kinds;
                        RowSet::new(columns)
                    });
                    set.rows.push(normalize_row(&row, &kinds, format));
                }
                Either::Left(done) => outcomes.push(Outcome {
                    rows: current.take(),
                    affected: done.rows_affected(),
                    last_insert_id: done.last_insert_id(),
                }),
            }
        }
    }

    if let Some(set) = current.take() {
        outcomes.push(Outcome {
            rows: Some(set),
            affected: 0,
            last_insert_id: 0,
        });
    }
    if outcomes.is_empty() {
        outcomes.push(Outcome {
            rows: None,
            affected: 0,
            last_insert_id: 0,
        });
    }

    let texts = statement_texts(sql, outcomes.len());
    let mut results = Vec::with_capacity(outcomes.len());
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let result = match (outcome.rows, texts.get(i)) {
            (Some(set), _) => QueryResult::Rows(set),
            (None, Some(text)) => empty_or_affected(conn, text, outcome.affected, outcome.last_insert_id).await,
            (None, None) => QueryResult::Affected(AffectedRows {
                statement: UNKNOWN_STATEMENT.to_string(),
                count: outcome.affected,
                last_insert_id: None,
            }),
        };
        results.push(result);
    }

    if results.len() == 1 {
        Ok(results.remove(0))
    } else {
        Ok(QueryResult::Batch(results))
    }
}

fn bind_parameters<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => query.bind(s.clone()),
            // Arrays and objects go in as JSON text
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Source text of each statement, when it lines up with the outcomes
///
/// Compound statements such as procedure bodies contain semicolons of their
/// own; when the split does not match what the server reported, only a
/// single outcome can still be attributed to the whole text.
fn statement_texts(sql: &str, outcomes: usize) -> Vec<&str> {
    let statements = split_statements(sql);
    if statements.len() == outcomes {
        statements
    } else if outcomes == 1 {
        vec![sql]
    } else {
        Vec::new()
    }
}

/// Split statement text on `;` outside quotes and comments
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            b';' => {
                pieces.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < sql.len() {
        pieces.push(&sql[start..]);
    }

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !skip_noise(piece).is_empty())
        .collect()
}

/// Tell an empty result set apart from a statement without one
async fn empty_or_affected(
    conn: &mut MySqlConnection,
    sql: &str,
    count: u64,
    last_insert_id: u64,
) -> QueryResult {
    // Preparing only describes the statement; nothing runs a second time
    if let Ok(prepared) = (&mut *conn).prepare(sql).await {
        if !prepared.columns().is_empty() {
            let columns = prepared.columns().iter().map(|c| c.name().to_string()).collect();
            return QueryResult::Rows(RowSet::new(columns));
        }
    }

    let statement = statement_kind(sql);
    let last_insert_id = (statement == "INSERT" || statement == "REPLACE")
        .then_some(last_insert_id)
        .filter(|id| *id != 0);

    QueryResult::Affected(AffectedRows {
        statement,
        count,
        last_insert_id,
    })
}

/// Skip whitespace, comments and opening parentheses
fn skip_noise(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = trimmed.strip_prefix("--").or_else(|| trimmed.strip_prefix('#')) {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("");
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("");
        } else {
            return trimmed;
        }
    }
}

/// Leading keyword of a statement, skipping comments and parentheses
pub fn statement_kind(sql: &str) -> String {
    let keyword: String = skip_noise(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if keyword.is_empty() {
        UNKNOWN_STATEMENT.to_string()
    } else {
        keyword
    }
}
