use crate::config::DatabaseConfig;
use crate::error::{Result, StoreError};
use libsql::{Builder, Connection, Database};
use tracing::info;

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open a local libSQL file or connect to a remote Turso database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = if config.is_remote() {
            let auth_token = config.auth_token.clone().ok_or_else(|| {
                StoreError::database("LIBSQL_AUTH_TOKEN is required for a remote database")
            })?;

            info!("Connecting to Turso database at {}", config.url);
            Builder::new_remote(config.url.clone(), auth_token)
                .build()
                .await
                .map_err(|e| StoreError::Database {
                    message: format!("Failed to connect to database: {e}"),
                })?
        } else {
            info!("Opening local database at {}", config.local_path());
            Builder::new_local(config.local_path())
                .build()
                .await
                .map_err(|e| StoreError::Database {
                    message: format!("Failed to open database: {e}"),
                })?
        };

        Ok(Self { db })
    }

    /// Get a connection to the database with foreign key enforcement enabled
    pub async fn get_connection(&self) -> Result<Connection> {
        let conn = self.db.connect().map_err(|e| StoreError::Database {
            message: format!("Failed to get database connection: {e}"),
        })?;

        // Cascading deletes depend on this; SQLite leaves it off per connection.
        conn.execute("PRAGMA foreign_keys = ON", libsql::params![])
            .await
            .map_err(|e| StoreError::Database {
                message: format!("Failed to enable foreign keys: {e}"),
            })?;

        Ok(conn)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;

        let migration_sql_001 = include_str!("../migrations/001_create_ranklist_tables.sql");
        conn.execute_batch(migration_sql_001)
            .await
            .map_err(|e| StoreError::Database {
                message: format!("Failed to run base migration: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}
