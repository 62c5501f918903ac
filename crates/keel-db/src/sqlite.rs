//! # SQLite Connections
//!
//! SQLite implementations of the [`crate::connection`] contracts.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Connection, Many Handles                       │
//! │                                                                         │
//! │  DbConfig { provider_name, connection_string }                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteConnectionProvider::get_connection().await                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SharedConnection ── Arc<Mutex<Option<SqliteConnection>>>              │
//! │       │                                                                 │
//! │       ├── clone ──► Repository<Customer>  ┐                            │
//! │       ├── clone ──► Repository<Order>     ├─ every statement locks     │
//! │       └── clone ──► SqliteTransaction     ┘  the same connection       │
//! │                                                                         │
//! │  BEGIN / COMMIT / ROLLBACK run on that connection, so every            │
//! │  repository bound to it takes part in the transaction.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No pooling: each `get_connection()` opens exactly one new connection.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::connection::{
    ConnectionId, ConnectionProvider, DbConnection, DbTransaction, TransactionState,
};
use crate::error::{DbError, DbResult};

// =============================================================================
// Shared Connection
// =============================================================================

/// A cloneable handle to one SQLite connection.
///
/// All clones share the connection and its identity. Statements are
/// serialised by an async mutex, so at most one statement is in flight.
#[derive(Clone)]
pub struct SharedConnection {
    id: ConnectionId,
    inner: Arc<Mutex<Option<SqliteConnection>>>,
}

impl SharedConnection {
    /// Wraps an open connection.
    pub fn new(connection: SqliteConnection) -> Self {
        SharedConnection {
            id: ConnectionId::new(),
            inner: Arc::new(Mutex::new(Some(connection))),
        }
    }

    /// Locks the connection slot for one statement.
    ///
    /// Resolve the slot with [`open_slot`].
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<SqliteConnection>> {
        self.inner.lock().await
    }

    /// Runs one or more raw SQL statements (schema setup, transaction
    /// control). Returns the number of affected rows.
    pub async fn execute_batch(&self, sql: &str) -> DbResult<u64> {
        let mut slot = self.lock().await;
        let connection = open_slot(&mut slot)?;

        let result = sqlx::Executor::execute(&mut *connection, sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }
}

/// Returns the connection held in a locked slot, or [`DbError::NotBound`]
/// once it has been closed.
pub(crate) fn open_slot(slot: &mut Option<SqliteConnection>) -> DbResult<&mut SqliteConnection> {
    slot.as_mut().ok_or(DbError::NotBound)
}

impl fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DbConnection for SharedConnection {
    type Transaction = SqliteTransaction;

    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn begin_transaction(&self) -> DbResult<SqliteTransaction> {
        self.execute_batch("BEGIN").await?;
        debug!(connection = %self.id, "Transaction started");

        Ok(SqliteTransaction {
            connection: self.clone(),
            state: TransactionState::Active,
        })
    }

    async fn close(&self) -> DbResult<()> {
        // Taking the connection out of the slot makes close happen once
        // no matter how many clones call it.
        let connection = self.lock().await.take();

        if let Some(connection) = connection {
            connection.close().await?;
            info!(connection = %self.id, "Connection closed");
        }

        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.lock().await.is_some()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction started with `BEGIN` on a [`SharedConnection`].
#[derive(Debug)]
pub struct SqliteTransaction {
    connection: SharedConnection,
    state: TransactionState,
}

impl SqliteTransaction {
    async fn finish(&mut self, statement: &str, next: TransactionState) -> DbResult<()> {
        if !self.state.is_active() {
            return Err(DbError::invalid_operation(format!(
                "transaction is already {:?}",
                self.state
            )));
        }

        self.connection.execute_batch(statement).await?;
        self.state = next;

        debug!(connection = %self.connection.id, state = ?next, "Transaction finished");
        Ok(())
    }
}

#[async_trait]
impl DbTransaction for SqliteTransaction {
    async fn commit(&mut self) -> DbResult<()> {
        self.finish("COMMIT", TransactionState::Committed).await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.finish("ROLLBACK", TransactionState::RolledBack).await
    }

    async fn dispose(&mut self) -> DbResult<()> {
        let previous = self.state;
        self.state = TransactionState::Disposed;

        // A closed connection has already ended the transaction
        if previous.is_active() && self.connection.is_open().await {
            debug!(connection = %self.connection.id, "Rolling back transaction on dispose");
            self.connection.execute_batch("ROLLBACK").await?;
        }

        Ok(())
    }

    fn state(&self) -> TransactionState {
        self.state
    }
}

// =============================================================================
// Connection Provider
// =============================================================================

/// Opens SQLite connections from a [`DbConfig`].
///
/// ## Example
/// ```rust,ignore
/// let provider = SqliteConnectionProvider::new(DbConfig::sqlite("sqlite://./keel.db?mode=rwc"));
/// let connection = provider.get_connection().await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConnectionProvider {
    config: DbConfig,
}

impl SqliteConnectionProvider {
    /// Creates a provider for the given configuration.
    pub fn new(config: DbConfig) -> Self {
        SqliteConnectionProvider { config }
    }

    /// Returns the configuration connections are opened from.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionProvider for SqliteConnectionProvider {
    type Connection = SharedConnection;

    async fn get_connection(&self) -> DbResult<SharedConnection> {
        self.config.validate()?;

        let connect_options = SqliteConnectOptions::from_str(&self.config.connection_string)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true);

        let connection = connect_options
            .connect()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let shared = SharedConnection::new(connection);
        info!(
            connection = %shared.id(),
            provider = %self.config.provider_name,
            "Connection opened"
        );

        Ok(shared)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn open() -> SharedConnection {
        SqliteConnectionProvider::new(DbConfig::in_memory())
            .get_connection()
            .await
            .unwrap()
    }

    async fn count(connection: &SharedConnection) -> i64 {
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot).unwrap();
        sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_provider_fails() {
        let provider = SqliteConnectionProvider::new(DbConfig::new("oracle", "x"));
        let result = provider.get_connection().await;
        assert!(matches!(result, Err(DbError::UnsupportedProvider(_))));
    }

    #[tokio::test]
    async fn test_malformed_connection_string_fails() {
        let provider = SqliteConnectionProvider::new(DbConfig::sqlite("postgres://nope"));
        let result = provider.get_connection().await;
        assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let connection = open().await;
        let clone = connection.clone();
        assert_eq!(connection.id(), clone.id());

        let other = open().await;
        assert_ne!(connection.id(), other.id());
    }

    #[tokio::test]
    async fn test_close_once_across_clones() {
        let connection = open().await;
        let clone = connection.clone();

        connection.close().await.unwrap();
        assert!(!clone.is_open().await);

        // Second close is a no-op
        clone.close().await.unwrap();
        assert!(matches!(
            clone.execute_batch("SELECT 1").await,
            Err(DbError::NotBound)
        ));
    }

    #[tokio::test]
    async fn test_commit_and_rollback() {
        let connection = open().await;
        connection
            .execute_batch("CREATE TABLE t (v INTEGER)")
            .await
            .unwrap();

        let mut tx = connection.begin_transaction().await.unwrap();
        connection.execute_batch("INSERT INTO t VALUES (1)").await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(count(&connection).await, 0);

        let mut tx = connection.begin_transaction().await.unwrap();
        connection.execute_batch("INSERT INTO t VALUES (1)").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(count(&connection).await, 1);

        // Finished transactions cannot be finished again
        assert!(matches!(
            tx.rollback().await,
            Err(DbError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_transaction_runs_on_spawned_task() {
        let connection = open().await;

        let task = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection.execute_batch("CREATE TABLE t (v INTEGER)").await?;
                let mut tx = connection.begin_transaction().await?;
                connection.execute_batch("INSERT INTO t VALUES (1)").await?;
                tx.commit().await?;
                tx.dispose().await
            }
        });

        task.await.unwrap().unwrap();
        assert_eq!(count(&connection).await, 1);
    }

    #[tokio::test]
    async fn test_dispose_rolls_back_active_transaction() {
        let connection = open().await;
        connection
            .execute_batch("CREATE TABLE t (v INTEGER)")
            .await
            .unwrap();

        let mut tx = connection.begin_transaction().await.unwrap();
        connection.execute_batch("INSERT INTO t VALUES (1)").await.unwrap();
        tx.dispose().await.unwrap();

        assert_eq!(tx.state(), TransactionState::Disposed);
        assert_eq!(count(&connection).await, 0);

        // Double dispose is guarded
        tx.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispose_after_close_is_silent() {
        let connection = open().await;
        let mut tx = connection.begin_transaction().await.unwrap();

        connection.close().await.unwrap();

        assert!(tx.dispose().await.is_ok());
        assert_eq!(tx.state(), TransactionState::Disposed);
    }
}
