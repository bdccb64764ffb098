//! Tool registry exposed to the agent framework.
//!
//! Each tool is a named action with a JSON parameter schema and a
//! text-in/text-out contract. The agent loop sends the schemas from
//! [`ToolRegistry::get_tool_schemas`] to the LLM and routes tool calls back
//! through [`ToolRegistry::execute`].

mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::db::SqlDatabase;

pub use sql::{DescribeSchema, ListTables, QueryArgs, RunQuery, TableSchemaArgs, ValidateQuery};

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `Err` means the call itself was malformed; failures the
    /// model should react to are returned as text.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Function-calling schema in the chat-completions format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registered tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four SQL tools over one shared database.
    pub fn with_sql_tools(db: Arc<SqlDatabase>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ListTables::new(db.clone())));
        registry.register(Arc::new(DescribeSchema::new(db.clone())));
        registry.register(Arc::new(RunQuery::new(db.clone())));
        registry.register(Arc::new(ValidateQuery::new(db)));
        registry
    }

    /// Add a tool, replacing any tool already registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!("Replacing already registered tool: {}", tool.name());
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                tool_type: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tracing::debug!("Calling tool {} with args: {}", name, args);
        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ToolRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ry.db");
        Connection::open(&path)
            .expect("open")
            .execute_batch(
                "CREATE TABLE sys_role ( -- roles
                    role_id INTEGER PRIMARY KEY,
                    role_name TEXT NOT NULL -- role name
                );
                CREATE TABLE sys_user ( -- system users
                    user_id INTEGER PRIMARY KEY,
                    nick_name TEXT
                );
                INSERT INTO sys_role VALUES (1, 'admin');
                INSERT INTO sys_user VALUES (1, 'ruoyi');",
            )
            .expect("fixture");

        let db = SqlDatabase::connect(&format!("sqlite://{}", path.display())).expect("connect");
        (dir, ToolRegistry::with_sql_tools(Arc::new(db)))
    }

    #[test]
    fn schemas_cover_every_tool() {
        let (_dir, registry) = registry();
        let names: Vec<_> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["list_tables", "table_schema", "run_query", "validate_query"]
        );

        let schemas = serde_json::to_value(registry.get_tool_schemas()).expect("json");
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[2]["function"]["name"], "run_query");
        assert_eq!(
            schemas[2]["function"]["parameters"]["required"],
            json!(["query"])
        );
    }

    #[tokio::test]
    async fn list_tables_summarises_tables() {
        let (_dir, registry) = registry();
        let out = registry.execute("list_tables", json!({})).await.expect("list");
        assert!(out.starts_with("There are 2 tables in the database:"));
        assert!(out.contains("1. Table: sys_role\n   Description: roles"));
        assert!(out.contains("2. Table: sys_user\n   Description: system users"));
    }

    #[tokio::test]
    async fn table_schema_accepts_missing_and_explicit_names() {
        let (_dir, registry) = registry();
        let all = registry.execute("table_schema", Value::Null).await.expect("all");
        assert!(all.contains("Table: sys_role") && all.contains("Table: sys_user"));

        let one = registry
            .execute("table_schema", json!({"table_names": ["sys_user"]}))
            .await
            .expect("one");
        assert!(one.starts_with("Table: sys_user"));
        assert!(!one.contains("sys_role"));

        let missing = registry
            .execute("table_schema", json!({"table_names": ["nope"]}))
            .await
            .expect("text error");
        assert!(missing.starts_with("Error getting table schema:"));
    }

    #[tokio::test]
    async fn run_query_turns_failures_into_text() {
        let (_dir, registry) = registry();
        let rows = registry
            .execute("run_query", json!({"query": "SELECT role_name FROM sys_role"}))
            .await
            .expect("rows");
        assert_eq!(rows, "('admin',)");

        let bare = registry
            .execute("run_query", json!("SELECT count(*) FROM sys_user"))
            .await
            .expect("bare string");
        assert_eq!(bare, "(1,)");

        let rejected = registry
            .execute("run_query", json!({"query": "DROP TABLE sys_user"}))
            .await
            .expect("policy text");
        assert!(rejected.starts_with("Error executing SQL query:"));
        assert!(rejected.contains("DROP"));

        let failed = registry
            .execute("run_query", json!({"query": "SELECT * FROM ghost"}))
            .await
            .expect("query text");
        assert!(failed.contains("ghost"));
    }

    #[tokio::test]
    async fn validate_query_returns_boolean_text() {
        let (_dir, registry) = registry();
        let ok = registry
            .execute("validate_query", json!({"query": "SELECT count(*) FROM sys_user;"}))
            .await
            .expect("valid");
        assert_eq!(ok, "true");

        let bad = registry
            .execute("validate_query", json!({"query": "DROP TABLE sys_user;"}))
            .await
            .expect("invalid");
        assert_eq!(bad, "false");
    }

    #[tokio::test]
    async fn malformed_calls_are_errors() {
        let (_dir, registry) = registry();
        assert!(registry.execute("send_email", json!({})).await.is_err());
        assert!(registry.execute("run_query", json!({})).await.is_err());
        assert!(registry
            .execute("table_schema", json!({"table_names": "sys_user"}))
            .await
            .is_err());
    }
}
