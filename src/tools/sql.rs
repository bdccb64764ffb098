//! SQL database tools: list tables, describe schema, run and validate queries.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Tool;
use crate::db::SqlDatabase;

/// Arguments of `table_schema`.
#[derive(Debug, Default, Deserialize)]
pub struct TableSchemaArgs {
    #[serde(default)]
    pub table_names: Option<Vec<String>>,
}

/// Arguments of `run_query` and `validate_query`.
#[derive(Debug, Deserialize)]
pub struct QueryArgs {
    pub query: String,
}

/// Decode tool arguments. `null` counts as an empty object and a bare JSON
/// string is taken as the `query` field.
fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> anyhow::Result<T> {
    let args = match args {
        Value::Null => json!({}),
        Value::String(query) => json!({ "query": query }),
        other => other,
    };
    serde_json::from_value(args)
        .map_err(|e| anyhow::anyhow!("Invalid arguments for {}: {}", tool, e))
}

fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": description
            }
        },
        "required": ["query"]
    })
}

/// List every table with its description.
pub struct ListTables {
    db: Arc<SqlDatabase>,
}

impl ListTables {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTables {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn description(&self) -> &str {
        "List all tables in the database with their descriptions. Use this first to learn which tables exist before writing a query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        let tables = match self.db.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::error!("Listing tables failed: {}", e);
                return Ok(format!("Error listing tables: {}", e));
            }
        };

        let mut result = format!("There are {} tables in the database:\n", tables.len());
        for (i, table) in tables.iter().enumerate() {
            let _ = write!(
                result,
                "{}. Table: {}\n   Description: {}\n\n",
                i + 1,
                table.name,
                table.comment.as_deref().unwrap_or("no description")
            );
        }
        Ok(result)
    }
}

/// Describe columns, keys and indexes of selected tables.
pub struct DescribeSchema {
    db: Arc<SqlDatabase>,
}

impl DescribeSchema {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for DescribeSchema {
    fn name(&self) -> &str {
        "table_schema"
    }

    fn description(&self) -> &str {
        "Get the schema of the given tables: columns with types and comments, primary keys, foreign keys and indexes. Input is a list of table names, e.g. [\"sys_user\", \"sys_role\"]. Use this to learn a table's columns before querying it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table_names": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Tables to describe. Omit or pass an empty list to describe every table."
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let args: TableSchemaArgs = parse_args(self.name(), args)?;

        match self.db.describe_schema(args.table_names.as_deref()).await {
            Ok(schema) => Ok(schema),
            Err(e) => {
                tracing::error!("Describing schema failed: {}", e);
                Ok(format!("Error getting table schema: {}", e))
            }
        }
    }
}

/// Execute a read-only SQL query.
pub struct RunQuery {
    db: Arc<SqlDatabase>,
}

impl RunQuery {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for RunQuery {
    fn name(&self) -> &str {
        "run_query"
    }

    fn description(&self) -> &str {
        "Execute a SQL SELECT query and return the result rows, one per line. Input must be a valid read-only query, e.g. SELECT * FROM sys_user LIMIT 5. Write and DDL statements are rejected."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The SQL SELECT query to execute")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let args: QueryArgs = parse_args(self.name(), args)?;

        match self.db.execute(&args.query).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                tracing::error!("Query failed: {}", e);
                Ok(format!("Error executing SQL query: {}", e))
            }
        }
    }
}

/// Check a query for syntax and read-only safety without running it.
pub struct ValidateQuery {
    db: Arc<SqlDatabase>,
}

impl ValidateQuery {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ValidateQuery {
    fn name(&self) -> &str {
        "validate_query"
    }

    fn description(&self) -> &str {
        "Validate a SQL query without executing it. Returns true if it is a read-only SELECT/WITH statement the database can plan, false otherwise. Use this to check a query before running it."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The SQL query to validate")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let args: QueryArgs = parse_args(self.name(), args)?;
        Ok(self.db.validate(&args.query).await.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_normalises_null_and_bare_strings() {
        let empty: TableSchemaArgs = parse_args("table_schema", Value::Null).expect("null");
        assert!(empty.table_names.is_none());

        let query: QueryArgs = parse_args("run_query", json!("SELECT 1")).expect("string");
        assert_eq!(query.query, "SELECT 1");

        let err = parse_args::<QueryArgs>("run_query", json!({"sql": "SELECT 1"})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments for run_query"));
    }
}
