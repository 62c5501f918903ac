//! # Connection Contracts
//!
//! The seams between the unit of work and the store: something that opens
//! connections, the connection itself, and the transaction it starts.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ConnectionProvider ──get_connection()──► DbConnection (one per UoW)   │
//! │                                               │                         │
//! │                          clone() per bound repository (same id)        │
//! │                                               │                         │
//! │                                  begin_transaction()                    │
//! │                                               ▼                         │
//! │                                         DbTransaction                   │
//! │                               Active ─► Committed | RolledBack          │
//! │                                 └──────────► Disposed ◄───┘             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The SQLite implementations live in [`crate::sqlite`].

use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

use crate::error::DbResult;

// =============================================================================
// Connection Identity
// =============================================================================

/// Identity of a live connection handle.
///
/// Clones of a handle share the identity, so two repositories can be
/// checked for sharing one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh identity.
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        ConnectionId::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Lifecycle of a transaction object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Started and not yet finished.
    Active,
    /// Finished by commit.
    Committed,
    /// Finished by rollback.
    RolledBack,
    /// Released; no further operation has any effect.
    Disposed,
}

impl TransactionState {
    /// Returns true if the transaction can still be committed or rolled back.
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

/// A transaction on a [`DbConnection`].
#[async_trait]
pub trait DbTransaction: Send + Sync {
    /// Makes every statement since begin permanent.
    async fn commit(&mut self) -> DbResult<()>;

    /// Discards every statement since begin.
    async fn rollback(&mut self) -> DbResult<()>;

    /// Releases the transaction.
    ///
    /// A still-active transaction is rolled back first. Calling it on a
    /// disposed transaction does nothing.
    async fn dispose(&mut self) -> DbResult<()>;

    /// Returns the current lifecycle state.
    fn state(&self) -> TransactionState;
}

// =============================================================================
// Connection
// =============================================================================

/// A cloneable handle to one open store connection.
#[async_trait]
pub trait DbConnection: Clone + Send + Sync + 'static {
    /// Transaction type started by [`DbConnection::begin_transaction`].
    type Transaction: DbTransaction;

    /// Returns the identity shared by all clones of this handle.
    fn id(&self) -> ConnectionId;

    /// Starts a transaction covering every statement issued on this
    /// connection until it finishes.
    async fn begin_transaction(&self) -> DbResult<Self::Transaction>;

    /// Closes the underlying connection.
    ///
    /// Takes effect once across all clones; later calls do nothing.
    async fn close(&self) -> DbResult<()>;

    /// Returns true until the connection has been closed.
    async fn is_open(&self) -> bool;
}

// =============================================================================
// Connection Provider
// =============================================================================

/// Opens ready-to-use connections from stored configuration.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Connection type produced by this provider.
    type Connection: DbConnection;

    /// Opens a new connection.
    async fn get_connection(&self) -> DbResult<Self::Connection>;
}
