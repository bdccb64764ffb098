//! # SQL Agent Tools
//!
//! Read-only SQL database tools for LLM agents.
//!
//! This library provides:
//! - A database façade that inspects schemas, validates and executes queries
//! - A tool registry exposing those operations to an agent's tool-call loop
//! - Environment-driven configuration and logging setup
//!
//! ## Architecture
//!
//! A text-to-SQL agent works the tools in a fixed rhythm:
//! 1. `list_tables` to see what the database holds
//! 2. `table_schema` for the tables relevant to the question
//! 3. `validate_query` on a candidate statement
//! 4. `run_query` to fetch the rows it answers from
//!
//! Every tool returns text; database failures come back as error messages the
//! model can react to instead of aborting the turn.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sql_agent_tools::{config::Config, db::SqlDatabase, tools::ToolRegistry};
//!
//! let config = Config::from_env()?;
//! let db = Arc::new(SqlDatabase::new(&config.database)?);
//! let tools = ToolRegistry::with_sql_tools(db);
//! let tables = tools.execute("list_tables", serde_json::json!({})).await?;
//! ```

pub mod config;
pub mod db;
pub mod logging;
pub mod tools;

pub use config::Config;
