//! Read-only database façade.
//!
//! [`SqlDatabase`] owns a connection pool and exposes the three operations the
//! SQL tools need:
//! - schema inspection (`list_tables`, `describe_schema`)
//! - dry-run validation (`validate`)
//! - policy-checked execution (`execute`)
//!
//! Every call checks out one connection, runs on a blocking worker and returns
//! the connection to the pool when done, on error paths too. Nothing is cached.

mod error;
mod pool;
mod query;
mod schema;

use rusqlite::Connection;

use crate::config::DatabaseConfig;

pub use error::{DbError, Result};
pub use pool::{ConnectionTarget, OpenMode};
pub use query::FORBIDDEN_KEYWORDS;
pub use schema::{
    ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, TableDescriptor, TableSchema,
    NO_SCHEMA_INFO,
};

/// Pool occupancy snapshot.
pub type PoolStatus = deadpool::managed::Status;

/// The database façade used by the SQL tools.
pub struct SqlDatabase {
    pool: pool::Pool,
    target: ConnectionTarget,
}

impl SqlDatabase {
    /// Build the façade. Connections are opened lazily on first use.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let target = ConnectionTarget::parse(&config.url)?;
        let pool = pool::build_pool(
            target.clone(),
            config.pool_size,
            config.max_overflow,
            config.pool_recycle,
        )?;
        tracing::info!(
            "Database pool ready: path={} mode={:?} max_size={}",
            target.path.display(),
            target.mode,
            pool.status().max_size
        );
        Ok(Self { pool, target })
    }

    /// Build the façade from a connection string with default pool settings.
    pub fn connect(url: &str) -> Result<Self> {
        Self::new(&DatabaseConfig::new(url))
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    async fn with_connection<T, F>(&self, on_error: fn(String) -> DbError, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| on_error(format!("failed to acquire connection: {}", e)))?;

        tokio::task::spawn_blocking(move || f(&*conn))
            .await
            .map_err(|e| on_error(format!("database worker failed: {}", e)))?
    }

    /// List base tables with their comments, alphabetically.
    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let tables = self
            .with_connection(DbError::Schema, schema::list_tables)
            .await?;
        tracing::debug!("Listed {} tables", tables.len());
        Ok(tables)
    }

    /// Render the schema of the given tables; `None` or an empty slice
    /// describes every base table.
    pub async fn describe_schema(&self, table_names: Option<&[String]>) -> Result<String> {
        let names = table_names.map(<[String]>::to_vec).unwrap_or_default();
        tracing::debug!("Describing schema for {:?}", names);
        self.with_connection(DbError::Schema, move |conn| {
            schema::describe_schema(conn, &names)
        })
        .await
    }

    /// Whether `query` is a read statement the engine can plan.
    ///
    /// Never fails: anything that is not `SELECT`/`WITH` is rejected without
    /// touching the pool, and database errors are logged and reported as `false`.
    pub async fn validate(&self, query: &str) -> bool {
        if !query::has_read_prefix(query) {
            tracing::debug!("Rejected non-read statement during validation");
            return false;
        }

        let owned = query.to_string();
        match self
            .with_connection(DbError::Query, move |conn| query::explain(conn, &owned))
            .await
        {
            Ok(plan) => {
                tracing::debug!("Query plan: {}", plan.join(" | "));
                true
            }
            Err(e) => {
                tracing::warn!("Query validation failed: {}", e);
                false
            }
        }
    }

    /// Execute a read-only statement and render its rows, one per line.
    ///
    /// The forbidden-keyword policy is applied before a connection is
    /// checked out.
    pub async fn execute(&self, query: &str) -> Result<String> {
        query::check_policy(query)?;

        tracing::info!("Executing query: {}", query);
        let owned = query.to_string();
        self.with_connection(DbError::Query, move |conn| query::run(conn, &owned))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SqlDatabase) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ry.db");
        let conn = Connection::open(&path).expect("open");
        conn.execute_batch(
            "CREATE TABLE sys_dept ( -- departments
                dept_id INTEGER PRIMARY KEY,
                dept_name TEXT NOT NULL
            );
            CREATE TABLE sys_user ( -- system users
                user_id INTEGER PRIMARY KEY,
                dept_id INTEGER REFERENCES sys_dept(dept_id),
                nick_name TEXT -- display name
            );
            CREATE VIEW v_user AS SELECT nick_name FROM sys_user;
            INSERT INTO sys_dept VALUES (1, 'R&D');
            INSERT INTO sys_user VALUES (1, 1, 'admin'), (2, 1, 'ry');",
        )
        .expect("fixture");
        drop(conn);

        let db = SqlDatabase::connect(&format!("sqlite://{}", path.display())).expect("connect");
        (dir, db)
    }

    #[tokio::test]
    async fn validate_rejects_without_touching_the_pool() {
        let (_dir, db) = fixture();
        assert!(!db.validate("").await);
        assert!(!db.validate("   ").await);
        assert!(!db.validate("DROP TABLE sys_user").await);
        assert!(!db.validate("update sys_user set nick_name = 'x'").await);
        assert_eq!(db.pool_status().size, 0);
    }

    #[tokio::test]
    async fn validate_plans_read_statements() {
        let (_dir, db) = fixture();
        assert!(db.validate("SELECT 1").await);
        assert!(db.validate("select count(*) from sys_user;").await);
        assert!(db.validate("WITH u AS (SELECT * FROM sys_user) SELECT nick_name FROM u").await);
        assert!(!db.validate("SELECT * FROM no_such_table").await);
        assert!(!db.validate("SELECT FROM WHERE").await);
    }

    #[tokio::test]
    async fn execute_rejects_forbidden_keywords_before_checkout() {
        let (_dir, db) = fixture();
        let err = db.execute("DROP TABLE sys_user").await.unwrap_err();
        assert!(err.is_policy());
        assert!(db.execute("delete from sys_user").await.unwrap_err().is_policy());
        assert_eq!(db.pool_status().size, 0);
    }

    #[tokio::test]
    async fn execute_renders_rows() {
        let (_dir, db) = fixture();
        let out = db.execute("SELECT count(*) FROM sys_user").await.expect("count");
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains('2'));

        let rows = db
            .execute("SELECT user_id, nick_name FROM sys_user ORDER BY user_id")
            .await
            .expect("rows");
        assert_eq!(rows, "(1, 'admin')\n(2, 'ry')");
    }

    #[tokio::test]
    async fn execute_reports_database_errors() {
        let (_dir, db) = fixture();
        let err = db.execute("SELECT * FROM missing").await.unwrap_err();
        assert!(matches!(err, DbError::Query(ref msg) if msg.contains("missing")));
        // The connection went back to the pool.
        assert_eq!(db.pool_status().available, 1);
    }

    #[tokio::test]
    async fn list_tables_skips_views() {
        let (_dir, db) = fixture();
        let tables = db.list_tables().await.expect("list");
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "sys_dept");
        assert_eq!(tables[0].comment.as_deref(), Some("departments"));
        assert_eq!(tables[1].name, "sys_user");
    }

    #[tokio::test]
    async fn describe_none_and_empty_are_equivalent() {
        let (_dir, db) = fixture();
        let none = db.describe_schema(None).await.expect("none");
        let no_names: &[String] = &[];
        let empty = db.describe_schema(Some(no_names)).await.expect("empty");
        assert_eq!(none, empty);
        assert!(none.find("Table: sys_dept") < none.find("Table: sys_user"));
        assert!(none.contains("(dept_id) -> sys_dept(dept_id)"));
        assert!(none.contains("nick_name TEXT NULL -- display name"));
    }

    #[tokio::test]
    async fn describe_unknown_table_fails() {
        let (_dir, db) = fixture();
        let names = vec!["ghost".to_string()];
        let err = db.describe_schema(Some(&names)).await.unwrap_err();
        assert!(matches!(err, DbError::Schema(_)));
    }

    #[tokio::test]
    async fn read_only_mode_blocks_writes_that_slip_past_policy() {
        let (dir, _db) = fixture();
        let url = format!("sqlite://{}?mode=ro", dir.path().join("ry.db").display());
        let db = SqlDatabase::connect(&url).expect("connect");
        assert_eq!(db.target().mode, OpenMode::ReadOnly);
        // REPLACE is not on the keyword list; the read-only handle stops it.
        let err = db
            .execute("REPLACE INTO sys_dept VALUES (2, 'Ops')")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
    }
}
