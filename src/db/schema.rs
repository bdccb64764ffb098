//! Schema introspection and rendering.
//!
//! Everything here runs synchronously against a checked-out connection; the
//! façade moves the work onto a blocking worker.

use std::collections::HashMap;
use std::fmt::Write as _;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::error::{DbError, Result};

/// Returned by `describe_schema` when there is nothing to describe.
pub const NO_SCHEMA_INFO: &str = "no schema information found";

const NO_COMMENT: &str = "no comment";
const NO_DESCRIPTION: &str = "no description";

/// A base table and its descriptive comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub comment: Option<String>,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDescriptor {
    pub local_columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Everything known about one table, in fetch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: TableDescriptor,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
}

fn schema_err(e: rusqlite::Error) -> DbError {
    DbError::Schema(e.to_string())
}

/// List base tables of the `main` database, alphabetically.
pub fn list_tables(conn: &Connection) -> Result<Vec<TableDescriptor>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .map_err(schema_err)?;

    let rows = stmt
        .query_map([], |row| {
            let name: String = row.get(0)?;
            let sql: Option<String> = row.get(1)?;
            Ok((name, sql))
        })
        .map_err(schema_err)?;

    let mut tables = Vec::new();
    for row in rows {
        let (name, sql) = row.map_err(schema_err)?;
        let comment = sql.as_deref().and_then(|sql| parse_comments(sql).table);
        tables.push(TableDescriptor { name, comment });
    }
    Ok(tables)
}

/// Fetch the full schema of one table.
pub fn inspect_table(conn: &Connection, table_name: &str) -> Result<TableSchema> {
    let create_sql: Option<Option<String>> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table_name],
            |row| row.get(0),
        )
        .optional()
        .map_err(schema_err)?;
    let create_sql = create_sql
        .ok_or_else(|| DbError::Schema(format!("no such table: {}", table_name)))?
        .unwrap_or_default();
    let comments = parse_comments(&create_sql);

    let columns = fetch_columns(conn, table_name, &comments)?;
    let primary_key = fetch_primary_key(conn, table_name)?;
    let foreign_keys = fetch_foreign_keys(conn, table_name)?;
    let indexes = fetch_indexes(conn, table_name)?;

    Ok(TableSchema {
        table: TableDescriptor {
            name: table_name.to_string(),
            comment: comments.table,
        },
        columns,
        primary_key,
        foreign_keys,
        indexes,
    })
}

fn fetch_columns(
    conn: &Connection,
    table_name: &str,
    comments: &SqlComments,
) -> Result<Vec<ColumnDescriptor>> {
    let mut stmt = conn
        .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(schema_err)?;
    let rows = stmt
        .query_map(params![table_name], |row| {
            let name: String = row.get(0)?;
            let declared_type: String = row.get(1)?;
            let not_null: bool = row.get(2)?;
            let pk: i64 = row.get(3)?;
            Ok((name, declared_type, not_null, pk))
        })
        .map_err(schema_err)?;

    let mut columns = Vec::new();
    for row in rows {
        let (name, declared_type, not_null, pk) = row.map_err(schema_err)?;
        let comment = comments.columns.get(&name.to_lowercase()).cloned();
        columns.push(ColumnDescriptor {
            name,
            declared_type,
            nullable: !not_null && pk == 0,
            comment,
            is_primary_key: pk > 0,
        });
    }
    Ok(columns)
}

fn fetch_primary_key(conn: &Connection, table_name: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")
        .map_err(schema_err)?;
    let names = stmt
        .query_map(params![table_name], |row| row.get::<_, String>(0))
        .map_err(schema_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(schema_err)?;
    Ok(names)
}

fn fetch_foreign_keys(conn: &Connection, table_name: &str) -> Result<Vec<ForeignKeyDescriptor>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) \
             ORDER BY id, seq",
        )
        .map_err(schema_err)?;
    let rows = stmt
        .query_map(params![table_name], |row| {
            let id: i64 = row.get(0)?;
            let table: String = row.get(1)?;
            let from: String = row.get(2)?;
            // `to` is NULL when the reference targets the parent's primary key implicitly.
            let to: Option<String> = row.get(3)?;
            Ok((id, table, from, to))
        })
        .map_err(schema_err)?;

    let mut keys: Vec<(i64, ForeignKeyDescriptor)> = Vec::new();
    for row in rows {
        let (id, table, from, to) = row.map_err(schema_err)?;
        match keys.last_mut() {
            Some((last_id, fk)) if *last_id == id => {
                fk.local_columns.push(from);
                fk.referenced_columns.extend(to);
            }
            _ => keys.push((
                id,
                ForeignKeyDescriptor {
                    local_columns: vec![from],
                    referenced_table: table,
                    referenced_columns: to.into_iter().collect(),
                },
            )),
        }
    }

    let mut keys: Vec<ForeignKeyDescriptor> = keys.into_iter().map(|(_, fk)| fk).collect();
    for fk in keys.iter_mut().filter(|fk| fk.referenced_columns.is_empty()) {
        fk.referenced_columns = fetch_primary_key(conn, &fk.referenced_table)?;
    }
    Ok(keys)
}

fn fetch_indexes(conn: &Connection, table_name: &str) -> Result<Vec<IndexDescriptor>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, \"unique\" FROM pragma_index_list(?1) \
             WHERE origin != 'pk' ORDER BY name",
        )
        .map_err(schema_err)?;
    let listed = stmt
        .query_map(params![table_name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })
        .map_err(schema_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(schema_err)?;

    let mut cols_stmt = conn
        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
        .map_err(schema_err)?;

    let mut indexes = Vec::with_capacity(listed.len());
    for (name, unique) in listed {
        let columns = cols_stmt
            .query_map(params![name], |row| row.get::<_, Option<String>>(0))
            .map_err(schema_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(schema_err)?
            .into_iter()
            // Expression columns have no name.
            .map(|c| c.unwrap_or_else(|| "<expression>".to_string()))
            .collect();
        indexes.push(IndexDescriptor {
            name,
            columns,
            unique,
        });
    }
    Ok(indexes)
}

/// Comments recovered from a stored `CREATE TABLE` statement.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SqlComments {
    pub table: Option<String>,
    /// Keyed by lowercased column name.
    pub columns: HashMap<String, String>,
}

/// Pull `-- comment` annotations out of a `CREATE TABLE` statement.
///
/// A trailing comment on the `CREATE TABLE` line describes the table; one on
/// a column-definition line describes that column.
pub(crate) fn parse_comments(create_sql: &str) -> SqlComments {
    let mut comments = SqlComments::default();

    for line in create_sql.lines() {
        let Some((definition, comment)) = line.split_once("--") else {
            continue;
        };
        let comment = comment.trim();
        if comment.is_empty() {
            continue;
        }

        let definition = definition.trim();
        if is_create_table_line(definition) {
            if comments.table.is_none() {
                comments.table = Some(comment.to_string());
            }
            continue;
        }

        let Some(first) = definition.split_whitespace().next() else {
            continue;
        };
        let name = first.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']' | ',' | '('));
        if name.is_empty() || is_constraint_keyword(name) {
            continue;
        }
        comments
            .columns
            .insert(name.to_lowercase(), comment.to_string());
    }

    comments
}

/// `CREATE [TEMP|TEMPORARY] TABLE ...` as whole words; `create_time` does not count.
fn is_create_table_line(definition: &str) -> bool {
    let mut words = definition.split_whitespace();
    if !words.next().is_some_and(|w| w.eq_ignore_ascii_case("CREATE")) {
        return false;
    }
    match words.next() {
        Some(w) if w.eq_ignore_ascii_case("TEMP") || w.eq_ignore_ascii_case("TEMPORARY") => {
            words.next().is_some_and(|w| w.eq_ignore_ascii_case("TABLE"))
        }
        Some(w) => w.eq_ignore_ascii_case("TABLE"),
        None => false,
    }
}

fn is_constraint_keyword(word: &str) -> bool {
    matches!(
        word.to_uppercase().as_str(),
        "PRIMARY" | "FOREIGN" | "UNIQUE" | "CHECK" | "CONSTRAINT" | ")"
    )
}

/// Render one table as a text paragraph.
pub fn render_table(schema: &TableSchema) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Table: {}", schema.table.name);
    let _ = writeln!(
        out,
        "Description: {}",
        schema.table.comment.as_deref().unwrap_or(NO_DESCRIPTION)
    );

    out.push_str("Columns:\n");
    for col in &schema.columns {
        let declared_type = if col.declared_type.is_empty() {
            "ANY"
        } else {
            col.declared_type.as_str()
        };
        let _ = write!(
            out,
            "  - {} {} {}",
            col.name,
            declared_type,
            if col.nullable { "NULL" } else { "NOT NULL" }
        );
        if col.is_primary_key {
            out.push_str(" (primary key)");
        }
        let _ = writeln!(out, " -- {}", col.comment.as_deref().unwrap_or(NO_COMMENT));
    }

    if !schema.primary_key.is_empty() {
        let _ = writeln!(out, "Primary key: ({})", schema.primary_key.join(", "));
    }

    if !schema.foreign_keys.is_empty() {
        out.push_str("Foreign keys:\n");
        for fk in &schema.foreign_keys {
            let _ = writeln!(
                out,
                "  - ({}) -> {}({})",
                fk.local_columns.join(", "),
                fk.referenced_table,
                fk.referenced_columns.join(", ")
            );
        }
    }

    if !schema.indexes.is_empty() {
        out.push_str("Indexes:\n");
        for idx in &schema.indexes {
            let _ = write!(out, "  - {} ({})", idx.name, idx.columns.join(", "));
            if idx.unique {
                out.push_str(" UNIQUE");
            }
            out.push('\n');
        }
    }

    out.trim_end().to_string()
}

/// Describe the named tables, or every base table when `table_names` is empty.
pub fn describe_schema(conn: &Connection, table_names: &[String]) -> Result<String> {
    let names: Vec<String> = if table_names.is_empty() {
        list_tables(conn)?.into_iter().map(|t| t.name).collect()
    } else {
        table_names.to_vec()
    };

    if names.is_empty() {
        return Ok(NO_SCHEMA_INFO.to_string());
    }

    let mut paragraphs = Vec::with_capacity(names.len());
    for name in &names {
        let schema = inspect_table(conn, name)?;
        paragraphs.push(render_table(&schema));
    }
    Ok(paragraphs.join("\n\n"))
}
