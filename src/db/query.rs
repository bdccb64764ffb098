//! Read-only query policy, dry-run validation and execution.

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::error::{DbError, Result};

/// Keywords that reject a statement outright when found anywhere in it.
pub const FORBIDDEN_KEYWORDS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE"];

/// Leading keywords the validator accepts.
const READ_PREFIXES: [&str; 2] = ["SELECT", "WITH"];

/// Substring match, case-insensitive. A keyword inside a literal or an
/// identifier (`created_at`) trips it too.
pub fn check_policy(query: &str) -> Result<()> {
    let upper = query.to_uppercase();
    match FORBIDDEN_KEYWORDS.into_iter().find(|kw| upper.contains(kw)) {
        Some(keyword) => Err(DbError::Policy { keyword }),
        None => Ok(()),
    }
}

/// Whether the statement starts with a read keyword. Fails closed on blank input.
pub fn has_read_prefix(query: &str) -> bool {
    let leading = query
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    !leading.is_empty()
        && READ_PREFIXES
            .iter()
            .any(|prefix| leading.eq_ignore_ascii_case(prefix))
}

/// Ask the engine for a query plan without producing result rows.
pub fn explain(conn: &Connection, query: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("EXPLAIN QUERY PLAN {}", query.trim()))
        .map_err(|e| DbError::Query(e.to_string()))?;
    let plan = stmt
        .query_map([], |row| row.get::<_, String>("detail"))
        .map_err(|e| DbError::Query(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| DbError::Query(e.to_string()))?;
    Ok(plan)
}

/// Run a statement and render every row on its own line.
pub fn run(conn: &Connection, query: &str) -> Result<String> {
    let mut stmt = conn
        .prepare(query.trim())
        .map_err(|e| DbError::Query(e.to_string()))?;
    let column_count = stmt.column_count();

    let mut rows = stmt.query([]).map_err(|e| DbError::Query(e.to_string()))?;
    let mut lines = Vec::new();
    while let Some(row) = rows.next().map_err(|e| DbError::Query(e.to_string()))? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = row.get_ref(i).map_err(|e| DbError::Query(e.to_string()))?;
            values.push(render_value(value));
        }
        lines.push(render_row(&values));
    }
    Ok(lines.join("\n"))
}

fn render_row(values: &[String]) -> String {
    match values {
        [single] => format!("({},)", single),
        _ => format!("({})", values.join(", ")),
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        // Debug keeps the fraction on whole numbers: 2.0, not 2.
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(bytes) => format!("'{}'", String::from_utf8_lossy(bytes).replace('\'', "''")),
        ValueRef::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
    }
}
