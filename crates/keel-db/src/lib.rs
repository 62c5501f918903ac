//! # keel-db: Database Layer for Keel
//!
//! Repositories over SQLite and the unit of work that makes several of them
//! share one connection and one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Keel Data Flow                                 │
//! │                                                                         │
//! │  Application code                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     keel-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  UnitOfWork   │    │  Repositories │    │  Connection  │  │   │
//! │  │   │(unit_of_work) │    │ (repository)  │    │  (sqlite.rs) │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ registry      │───►│ Repository<T> │───►│ Shared       │  │   │
//! │  │   │ transaction   │    │ ScopedRepo<T> │    │ Connection   │  │   │
//! │  │   │ lifecycle     │    │               │    │ Provider     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Provider name and connection string
//! - [`connection`] - Connection, transaction and provider contracts
//! - [`sqlite`] - SQLite implementations of those contracts
//! - [`repository`] - CRUD capability set and generic repositories
//! - [`unit_of_work`] - Shared connection, registry and transaction
//! - [`error`] - Database error types
//! - [`logging`] - Subscriber setup for binaries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_db::{DbConfig, Repository, SqliteConnectionProvider, UnitOfWorkBuilder};
//!
//! let provider = Arc::new(SqliteConnectionProvider::new(DbConfig::load(None)?));
//!
//! let mut uow = UnitOfWorkBuilder::new()
//!     .provider(provider)
//!     .repository(Arc::new(Repository::<Customer>::new()))
//!     .repository(Arc::new(Repository::<Order>::new()))
//!     .build()
//!     .await?;
//!
//! uow.begin_transaction().await?;
//! let customers = uow.repository::<Customer>().expect("registered");
//! customers.insert(&mut Customer::new("Joe")).await?;
//! uow.commit().await?;
//!
//! uow.dispose().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod repository;
pub mod sqlite;
pub mod unit_of_work;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DbConfig, Provider};
pub use connection::{ConnectionId, ConnectionProvider, DbConnection, DbTransaction, TransactionState};
pub use error::{DbError, DbResult};
pub use sqlite::{SharedConnection, SqliteConnectionProvider, SqliteTransaction};
pub use unit_of_work::{Registration, UnitOfWork, UnitOfWorkBuilder};

// Repository re-exports for convenience
pub use repository::{BindConnection, CrudRepository, Record, Repository, ScopedRepository, SqliteQuery};

// Entity contract, so callers need only one dependency
pub use keel_core::{Audit, Entity, EntityId, EntityType, UNSET_ID};
