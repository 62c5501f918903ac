//! # Unit of Work
//!
//! One connection, a fixed set of repositories bound to it, and at most one
//! transaction spanning all of them.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Unit of Work State Machine                        │
//! │                                                                         │
//! │  UnitOfWorkBuilder::new()                                              │
//! │      .provider(p).repository(customers).repository(orders)             │
//! │      .build().await                                                    │
//! │       │   1. validate arguments (nothing opened yet)                   │
//! │       │   2. p.get_connection()          ← exactly once                │
//! │       │   3. set_connection() on every repository                      │
//! │       │   4. index by entity type        ← first registration wins     │
//! │       ▼                                                                 │
//! │  ┌───────────────┐  begin_transaction()  ┌───────────────┐            │
//! │  │ NoTransaction │ ────────────────────► │    Active     │            │
//! │  │               │ ◄──────────────────── │               │            │
//! │  └───────┬───────┘  commit() / rollback()└───────┬───────┘            │
//! │          │                                       │                     │
//! │          └────────────── dispose() ──────────────┘                     │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                     ┌─────────────────┐                                 │
//! │                     │    Disposed     │  registry cleared,              │
//! │                     │   (terminal)    │  transaction disposed,          │
//! │                     └─────────────────┘  connection closed              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership and Synchronisation
//! - The unit of work owns the connection and the transaction.
//! - It shares the repositories with the caller (`Arc`); disposing it only
//!   forgets them.
//! - Lifecycle operations take `&mut self`: one owner drives a unit of work
//!   at a time. The registry is not mutated between construction and
//!   dispose. Statements from different repositories are serialised by the
//!   connection itself.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keel_core::{Entity, EntityType};
use tracing::{debug, info, warn};

use crate::connection::{ConnectionProvider, DbConnection, DbTransaction};
use crate::error::{DbError, DbResult};
use crate::repository::{BindConnection, CrudRepository};

// =============================================================================
// Registration
// =============================================================================

/// A repository prepared for registration with a unit of work.
///
/// Keeps two views of the same repository: the binding used to point it at
/// the shared connection, and the typed CRUD handle returned by
/// [`UnitOfWork::repository`].
pub struct Registration<C> {
    entity_type: EntityType,
    binder: Arc<dyn BindConnection<C>>,
    // Arc<dyn CrudRepository<Entity = T>> for the registered T
    handle: Box<dyn Any + Send + Sync>,
}

impl<C: DbConnection> Registration<C> {
    /// Wraps a repository, keyed by its `Entity` type.
    pub fn new<R>(repository: Arc<R>) -> Self
    where
        R: CrudRepository + BindConnection<C> + 'static,
    {
        // Keyed on the associated type so the handle always downcasts
        let entity_type = EntityType::of::<R::Entity>();
        let handle: Arc<dyn CrudRepository<Entity = R::Entity>> = repository.clone();

        Registration {
            entity_type,
            binder: repository,
            handle: Box::new(handle),
        }
    }

    /// Returns the entity type the registration is keyed by.
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }
}

impl<C> fmt::Debug for Registration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("entity_type", &self.entity_type)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects the provider and repositories of a unit of work.
///
/// ## Example
/// ```rust,ignore
/// let provider = Arc::new(SqliteConnectionProvider::new(config));
/// let customers = Arc::new(Repository::<Customer>::new());
/// let orders = Arc::new(Repository::<Order>::new());
///
/// let mut uow = UnitOfWorkBuilder::new()
///     .provider(provider)
///     .repository(customers)
///     .repository(orders)
///     .build()
///     .await?;
/// ```
pub struct UnitOfWorkBuilder<P: ConnectionProvider> {
    provider: Option<Arc<P>>,
    registrations: Vec<Registration<P::Connection>>,
}

impl<P: ConnectionProvider> UnitOfWorkBuilder<P> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        UnitOfWorkBuilder {
            provider: None,
            registrations: Vec::new(),
        }
    }

    /// Sets the connection provider.
    pub fn provider(mut self, provider: Arc<P>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Adds a repository.
    ///
    /// The repository must not be bound to another open connection, such as
    /// that of a unit of work that has not been disposed.
    pub fn repository<R>(self, repository: Arc<R>) -> Self
    where
        R: CrudRepository + BindConnection<P::Connection> + 'static,
    {
        self.registration(Registration::new(repository))
    }

    /// Adds a prepared registration.
    pub fn registration(mut self, registration: Registration<P::Connection>) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Opens the connection and binds every repository to it.
    ///
    /// ## Errors
    /// - [`DbError::InvalidArgument`] (`connection_provider`) without a provider
    /// - [`DbError::InvalidArgument`] (`repositories`) without repositories
    /// - [`DbError::InvalidOperation`] if a repository is still bound to
    ///   another open connection
    /// - whatever the provider reports when the connection cannot be opened
    pub async fn build(self) -> DbResult<UnitOfWork<P::Connection>> {
        let provider = self
            .provider
            .ok_or_else(|| DbError::invalid_argument("connection_provider"))?;

        UnitOfWork::new(provider.as_ref(), self.registrations).await
    }
}

impl<P: ConnectionProvider> Default for UnitOfWorkBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// Coordinates one connection, the repositories bound to it, and one
/// optional transaction.
pub struct UnitOfWork<C: DbConnection> {
    connection: Option<C>,
    transaction: Option<C::Transaction>,
    repositories: HashMap<EntityType, Registration<C>>,
    disposed: bool,
}

impl<C: DbConnection> UnitOfWork<C> {
    /// Opens one connection from `provider` and binds every repository to it.
    ///
    /// Arguments are validated before the provider is called, so a failed
    /// construction leaves nothing open.
    pub async fn new<P>(provider: &P, repositories: Vec<Registration<C>>) -> DbResult<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        if repositories.is_empty() {
            return Err(DbError::invalid_argument("repositories"));
        }

        // A repository serves one unit of work at a time
        for registration in &repositories {
            if let Some(bound) = registration.binder.connection() {
                if bound.is_open().await {
                    return Err(DbError::invalid_operation(format!(
                        "repository for {} is still bound to open connection {}",
                        registration.entity_type,
                        bound.id()
                    )));
                }
            }
        }

        let connection = provider.get_connection().await?;

        let mut index = HashMap::with_capacity(repositories.len());
        for registration in repositories {
            registration.binder.set_connection(connection.clone());

            match index.entry(registration.entity_type) {
                Entry::Vacant(slot) => {
                    slot.insert(registration);
                }
                Entry::Occupied(existing) => {
                    debug!(
                        entity = %existing.key(),
                        "Duplicate repository registration ignored"
                    );
                }
            }
        }

        info!(
            connection = %connection.id(),
            repositories = index.len(),
            "Unit of work created"
        );

        Ok(UnitOfWork {
            connection: Some(connection),
            transaction: None,
            repositories: index,
            disposed: false,
        })
    }

    /// Returns the repository registered for `T`.
    ///
    /// `None` if no repository was registered for `T`, or after
    /// [`UnitOfWork::dispose`].
    pub fn repository<T: Entity>(&self) -> Option<Arc<dyn CrudRepository<Entity = T>>> {
        self.repositories
            .get(&EntityType::of::<T>())?
            .handle
            .downcast_ref::<Arc<dyn CrudRepository<Entity = T>>>()
            .cloned()
    }

    /// Returns the connection shared by every registered repository.
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// Returns true while a transaction is active.
    pub fn has_active_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Returns true once [`UnitOfWork::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Starts a transaction covering every registered repository.
    ///
    /// ## Errors
    /// [`DbError::InvalidOperation`] if a transaction is already active (it
    /// is left untouched) or the unit of work has been disposed.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        if self.disposed {
            return Err(DbError::invalid_operation("unit of work is disposed"));
        }

        if self.transaction.is_some() {
            return Err(DbError::invalid_operation("a transaction is already started"));
        }

        let connection = self.connection.as_ref().ok_or(DbError::NotBound)?;
        let transaction = connection.begin_transaction().await?;
        self.transaction = Some(transaction);

        debug!(connection = %connection.id(), "Unit of work transaction started");
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// Returns `false` without doing anything when no transaction is active.
    /// If the store rejects the commit, the error is returned and the
    /// transaction stays active so it can still be rolled back.
    pub async fn commit(&mut self) -> DbResult<bool> {
        let Some(mut transaction) = self.transaction.take() else {
            debug!("Nothing to commit");
            return Ok(false);
        };

        if let Err(e) = transaction.commit().await {
            self.transaction = Some(transaction);
            return Err(e);
        }

        release(transaction).await;
        debug!("Unit of work transaction committed");
        Ok(true)
    }

    /// Rolls back the active transaction; does nothing without one.
    pub async fn rollback(&mut self) -> DbResult<()> {
        let Some(mut transaction) = self.transaction.take() else {
            debug!("Nothing to roll back");
            return Ok(());
        };

        if let Err(e) = transaction.rollback().await {
            self.transaction = Some(transaction);
            return Err(e);
        }

        release(transaction).await;
        debug!("Unit of work transaction rolled back");
        Ok(())
    }

    /// Releases everything the unit of work holds.
    ///
    /// 1. forgets every registered repository
    /// 2. disposes the transaction, if any (an active one is rolled back)
    /// 3. closes the connection
    ///
    /// Runs once; later calls do nothing. Never fails: teardown errors are
    /// logged and dropped.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.repositories.clear();

        if let Some(transaction) = self.transaction.take() {
            release(transaction).await;
        }

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!(connection = %connection.id(), error = %e, "Failed to close connection");
            }
            info!(connection = %connection.id(), "Unit of work disposed");
        }
    }
}

/// Disposes a transaction, logging instead of failing.
async fn release<T: DbTransaction>(mut transaction: T) {
    if let Err(e) = transaction.dispose().await {
        warn!(error = %e, "Failed to dispose transaction");
    }
}

impl<C: DbConnection> fmt::Debug for UnitOfWork<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("connection", &self.connection.as_ref().map(|c| c.id()))
            .field("transaction_active", &self.transaction.is_some())
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<C: DbConnection> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        if !self.disposed {
            warn!("Unit of work dropped without dispose; the connection closes with its last handle");
        }
    }
}

// =============================================================================
// Unit Tests (recording doubles)
// =============================================================================


// =============================================================================
// Integration Tests (SQLite)
// =============================================================================
