//! SQLite connection and schema

use std::str::FromStr;

use autoattend_core::{AttendError, AttendResult, ErrorContext};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::{CredentialStore, RequestStore};

/// Shared connection pool plus the table facades built on it
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to `database_url` and create missing tables
    pub async fn connect(database_url: &str) -> AttendResult<Self> {
        info!(database_url, "Connecting to database");

        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            if let Some(path) = database_url.strip_prefix("sqlite:") {
                let path = path.trim_start_matches("//");
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        info!(directory = %parent.display(), "Creating database directory");
                        std::fs::create_dir_all(parent)?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AttendError::Config {
                message: format!("Invalid database URL '{}': {}", database_url, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("store")
                    .with_operation("connect")
                    .with_suggestion("Use a URL such as sqlite:user_data.db"),
            })?
            .create_if_missing(true);

        // Every connection to :memory: opens a separate database
        let max_connections = if in_memory { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AttendError::storage("Failed to connect to database", e, "connect"))?;

        let database = Self { pool };
        database.create_tables().await?;

        info!("Database ready");
        Ok(database)
    }

    async fn create_tables(&self) -> AttendResult<()> {
        debug!("Creating users table");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                default_duration INTEGER DEFAULT 60
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AttendError::storage("Failed to create users table", e, "create_tables"))?;

        debug!("Creating requests table");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                request_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                status TEXT DEFAULT 'pending'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AttendError::storage("Failed to create requests table", e, "create_tables"))?;

        Ok(())
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.pool.clone())
    }

    pub fn requests(&self) -> RequestStore {
        RequestStore::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
