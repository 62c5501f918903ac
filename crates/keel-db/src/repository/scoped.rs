//! # Connection-Per-Call Repository
//!
//! Wraps a [`Repository`] so that every operation runs on its own freshly
//! opened connection.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scoped.get(1).await                                                   │
//! │       │                                                                 │
//! │       ├── provider.get_connection()   ← open                           │
//! │       ├── Repository::with_connection(conn).get(1)                     │
//! │       └── repository.close()          ← always, even on error          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because it never keeps a connection, it cannot take part in a unit of
//! work's transaction and does not implement [`super::BindConnection`].
//! Use a file-backed database: every in-memory SQLite connection is a
//! separate database.

use async_trait::async_trait;
use keel_core::{EntityId, EntityType};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{CrudRepository, Record, Repository};
use crate::connection::ConnectionProvider;
use crate::error::DbResult;
use crate::sqlite::SharedConnection;

/// Repository that opens and closes a connection around every call.
pub struct ScopedRepository<T, P>
where
    T: Record,
    P: ConnectionProvider<Connection = SharedConnection>,
{
    provider: Arc<P>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, P> ScopedRepository<T, P>
where
    T: Record,
    P: ConnectionProvider<Connection = SharedConnection>,
{
    /// Creates a repository drawing connections from `provider`.
    pub fn new(provider: Arc<P>) -> Self {
        ScopedRepository {
            provider,
            _entity: PhantomData,
        }
    }

    async fn open(&self) -> DbResult<Repository<T>> {
        let connection = self.provider.get_connection().await?;
        Ok(Repository::with_connection(connection))
    }
}

/// Closes the per-call repository, preferring the operation's own error.
async fn release<T: Record, R>(repository: Repository<T>, result: DbResult<R>) -> DbResult<R> {
    let closed = repository.close().await;
    let value = result?;
    closed?;
    Ok(value)
}

#[async_trait]
impl<T, P> CrudRepository for ScopedRepository<T, P>
where
    T: Record,
    P: ConnectionProvider<Connection = SharedConnection> + 'static,
{
    type Entity = T;

    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    async fn get_all(&self) -> DbResult<Vec<T>> {
        let repository = self.open().await?;
        let result = repository.get_all().await;
        release(repository, result).await
    }

    async fn get(&self, id: EntityId) -> DbResult<Option<T>> {
        let repository = self.open().await?;
        let result = repository.get(id).await;
        release(repository, result).await
    }

    async fn insert(&self, entity: &mut T) -> DbResult<EntityId> {
        let repository = self.open().await?;
        let result = repository.insert(entity).await;
        release(repository, result).await
    }

    async fn update(&self, entity: &T) -> DbResult<bool> {
        let repository = self.open().await?;
        let result = repository.update(entity).await;
        release(repository, result).await
    }

    async fn delete(&self, id: EntityId) -> DbResult<Option<T>> {
        let repository = self.open().await?;
        let result = repository.delete(id).await;
        release(repository, result).await
    }
}
