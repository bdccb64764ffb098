//! SQL Agent Tools - command-line entry point
//!
//! Invokes the SQL tools directly, the same way an agent's tool-call loop would.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use sql_agent_tools::{config::Config, db::SqlDatabase, logging, tools::ToolRegistry};
use tracing::info;

#[derive(Parser)]
#[command(name = "sql-agent-tools", version, about = "Read-only SQL tools for LLM agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the registered tools and their schemas
    Tools,
    /// Invoke one tool and print its output
    Call {
        /// Tool name, e.g. list_tables
        name: String,
        /// JSON arguments, e.g. '{"query": "SELECT 1"}'
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.log_sink)?;

    let db = Arc::new(SqlDatabase::new(&config.database)?);
    let tools = ToolRegistry::with_sql_tools(db);
    info!("Registered {} tools", tools.list_tools().len());

    match cli.command {
        Command::Tools => {
            let schemas = tools.get_tool_schemas();
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        }
        Command::Call { name, args } => {
            let args = match args {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Arguments are not valid JSON: {}", e))?,
                None => Value::Null,
            };
            let output = tools.execute(&name, args).await?;
            println!("{}", output);
        }
    }

    Ok(())
}
