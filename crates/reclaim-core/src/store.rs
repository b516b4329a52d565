use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::ReclaimError;

/// Relational store backend configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Keep every table in a single in-process SQLite connection. Used by
    /// tests and throwaway deployments; data dies with the process.
    Memory,
    /// Persist to an on-disk SQLite database, created on first use.
    File {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn file(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::File {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File { .. } => "file",
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Shared handle on the relational store.
///
/// Every externally-triggered operation runs inside one transaction taken
/// from this pool; registry, claim, message, and counter writes for a single
/// operation commit or roll back together.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    backend: &'static str,
}

impl Store {
    pub async fn bootstrap(config: StorageConfig) -> Result<Self, ReclaimError> {
        let backend = config.label();
        let pool = match config {
            // A pooled ":memory:" database is one database per connection;
            // cap the pool at a single connection so all operations see the
            // same tables.
            StorageConfig::Memory => SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
                .map_err(|e| ReclaimError::Storage(format!("sqlite connect failed: {e}")))?,
            StorageConfig::File {
                database_url,
                max_connections,
            } => {
                let options = SqliteConnectOptions::from_str(&database_url)
                    .map_err(|e| {
                        ReclaimError::Storage(format!("invalid database url '{database_url}': {e}"))
                    })?
                    .create_if_missing(true);
                SqlitePoolOptions::new()
                    .max_connections(max_connections.max(1))
                    .connect_with(options)
                    .await
                    .map_err(|e| ReclaimError::Storage(format!("sqlite connect failed: {e}")))?
            }
        };

        let store = Self { pool, backend };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, ReclaimError> {
        self.pool
            .begin()
            .await
            .map_err(|e| ReclaimError::Storage(format!("begin transaction failed: {e}")))
    }

    // Foreign keys are deliberately not enforced: administrator hard deletes
    // leave dangling claim/message references behind, and every read join
    // treats a missing row defensively instead.
    async fn ensure_schema(&self) -> Result<(), ReclaimError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                credential_hash TEXT NOT NULL,
                phone TEXT NULL,
                full_name TEXT NULL,
                student_id TEXT NULL,
                department TEXT NULL,
                year TEXT NULL,
                user_type TEXT NOT NULL DEFAULT 'student',
                created_at TEXT NOT NULL,
                last_login TEXT NULL,
                total_items_posted INTEGER NOT NULL DEFAULT 0,
                items_found INTEGER NOT NULL DEFAULT 0,
                items_lost INTEGER NOT NULL DEFAULT 0,
                claims_made INTEGER NOT NULL DEFAULT 0,
                claims_received INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS administrators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                credential_hash TEXT NOT NULL,
                created_by TEXT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS found_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_name TEXT NOT NULL,
                description TEXT NULL,
                color TEXT NULL,
                location TEXT NOT NULL,
                image_ref TEXT NULL,
                posted_by TEXT NOT NULL,
                posted_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lost_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_name TEXT NOT NULL,
                description TEXT NULL,
                color TEXT NULL,
                location TEXT NOT NULL,
                lost_date TEXT NULL,
                image_ref TEXT NULL,
                posted_by TEXT NOT NULL,
                posted_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS claims (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                found_item_id INTEGER NOT NULL,
                claimant_username TEXT NOT NULL,
                owner_username TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                address TEXT NOT NULL,
                contact_method TEXT NULL,
                proof_description TEXT NULL,
                proof_image_ref TEXT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                claim_date TEXT NOT NULL,
                admin_notified INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                subject TEXT NULL,
                body TEXT NOT NULL,
                item_id INTEGER NULL,
                item_kind TEXT NULL,
                claim_id INTEGER NULL,
                timestamp TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                from_admin INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_found_items_posted_by ON found_items (posted_by)",
            "CREATE INDEX IF NOT EXISTS idx_lost_items_posted_by ON lost_items (posted_by)",
            "CREATE INDEX IF NOT EXISTS idx_claims_found_item_id ON claims (found_item_id)",
            "CREATE INDEX IF NOT EXISTS idx_claims_owner ON claims (owner_username)",
            "CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages (recipient)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ReclaimError::Storage(format!("schema create failed: {e}")))?;
        }

        Ok(())
    }
}

/// Decode one named column, wrapping driver errors with the column name.
pub(crate) fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, ReclaimError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| ReclaimError::Storage(format!("decode column '{name}' failed: {e}")))
}
