//! # Generic Repository
//!
//! CRUD for any [`Record`] over whatever [`SharedConnection`] it is bound to.
//!
//! ## Connection Binding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Bare usage                         Inside a unit of work               │
//! │  ──────────                         ─────────────────────               │
//! │  Repository::with_connection(c)     Repository::new()  (unbound)        │
//! │       │                                  │                              │
//! │       │  owns c                          │  set_connection(uow conn)    │
//! │       ▼                                  ▼                              │
//! │  get / insert / ...                 get / insert / ...  (shared conn,   │
//! │       │                                                  shared tx)     │
//! │       ▼                                                                 │
//! │  repo.close()  ← releases c once                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use keel_core::{EntityId, EntityType};
use parking_lot::RwLock;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

use super::statements::Statements;
use super::{BindConnection, CrudRepository, Record};
use crate::connection::DbConnection;
use crate::error::{DbError, DbResult};
use crate::sqlite::{open_slot, SharedConnection};

/// Repository for one entity type.
///
/// ## Usage
/// ```rust,ignore
/// let repo = Repository::<Customer>::with_connection(connection);
///
/// let mut joe = Customer::new("Joe");
/// let id = repo.insert(&mut joe).await?;
/// let found = repo.get(id).await?;
/// ```
pub struct Repository<T: Record> {
    connection: RwLock<Option<SharedConnection>>,
    statements: Statements,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Record> Repository<T> {
    /// Creates a repository with no connection.
    ///
    /// Every operation fails with [`DbError::NotBound`] until
    /// [`BindConnection::set_connection`] is called.
    pub fn new() -> Self {
        Repository {
            connection: RwLock::new(None),
            statements: Statements::for_entity::<T>(),
            _entity: PhantomData,
        }
    }

    /// Creates a repository bound to `connection`.
    pub fn with_connection(connection: SharedConnection) -> Self {
        let repository = Self::new();
        repository.set_connection(connection);
        repository
    }

    /// Releases the bound connection.
    ///
    /// The binding is cleared and the connection closed; calling it again,
    /// or on an unbound repository, does nothing.
    pub async fn close(&self) -> DbResult<()> {
        let connection = self.connection.write().take();

        if let Some(connection) = connection {
            debug!(table = T::TABLE, connection = %connection.id(), "Releasing connection");
            connection.close().await?;
        }

        Ok(())
    }

    fn bound(&self) -> DbResult<SharedConnection> {
        self.connection.read().clone().ok_or(DbError::NotBound)
    }
}

impl<T: Record> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &T::TABLE)
            .field("connection", &*self.connection.read())
            .finish()
    }
}

impl<T: Record> BindConnection<SharedConnection> for Repository<T> {
    fn set_connection(&self, connection: SharedConnection) {
        debug!(table = T::TABLE, connection = %connection.id(), "Repository bound");
        *self.connection.write() = Some(connection);
    }

    fn connection(&self) -> Option<SharedConnection> {
        self.connection.read().clone()
    }
}

#[async_trait]
impl<T: Record> CrudRepository for Repository<T> {
    type Entity = T;

    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    async fn get_all(&self) -> DbResult<Vec<T>> {
        let connection = self.bound()?;
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot)?;

        let rows = sqlx::query_as::<_, T>(&self.statements.select_all)
            .fetch_all(&mut *conn)
            .await?;

        debug!(table = T::TABLE, count = rows.len(), "Fetched all rows");
        Ok(rows)
    }

    async fn get(&self, id: EntityId) -> DbResult<Option<T>> {
        let connection = self.bound()?;
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot)?;

        let row = sqlx::query_as::<_, T>(&self.statements.select_by_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        debug!(table = T::TABLE, id, found = row.is_some(), "Fetched row");
        Ok(row)
    }

    async fn insert(&self, entity: &mut T) -> DbResult<EntityId> {
        let connection = self.bound()?;
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot)?;

        let audit = *entity.audit();
        let result = entity
            .bind_columns(sqlx::query(&self.statements.insert))
            .bind(audit.created)
            .bind(audit.last_modified)
            .execute(&mut *conn)
            .await?;

        let id = result.last_insert_rowid();
        entity.set_id(id);

        debug!(table = T::TABLE, id, "Inserted row");
        Ok(id)
    }

    async fn update(&self, entity: &T) -> DbResult<bool> {
        let connection = self.bound()?;
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot)?;

        let audit = entity.audit();
        let result = entity
            .bind_columns(sqlx::query(&self.statements.update))
            .bind(audit.created)
            .bind(audit.last_modified)
            .bind(entity.id())
            .execute(&mut *conn)
            .await?;

        let updated = result.rows_affected() > 0;
        debug!(table = T::TABLE, id = entity.id(), updated, "Updated row");
        Ok(updated)
    }

    async fn delete(&self, id: EntityId) -> DbResult<Option<T>> {
        let connection = self.bound()?;
        let mut slot = connection.lock().await;
        let conn = open_slot(&mut slot)?;

        let found = sqlx::query_as::<_, T>(&self.statements.select_by_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(entity) = found else {
            debug!(table = T::TABLE, id, "Nothing to delete");
            return Ok(None);
        };

        let result = sqlx::query(&self.statements.delete)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        debug!(table = T::TABLE, id, "Deleted row");
        Ok(Some(entity))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_connection, seed_people, Person};
    use keel_core::Entity;

    async fn seeded() -> Repository<Person> {
        let repo = Repository::with_connection(memory_connection().await);
        seed_people(&repo).await;
        repo
    }

    #[tokio::test]
    async fn test_entity_type() {
        let repo = Repository::<Person>::new();
        assert_eq!(repo.entity_type(), EntityType::of::<Person>());
        assert_eq!(repo.entity_type().name(), "Person");
    }

    #[tokio::test]
    async fn test_unbound_repository_fails() {
        let repo = Repository::<Person>::new();
        assert!(matches!(repo.get_all().await, Err(DbError::NotBound)));
    }

    #[tokio::test]
    async fn test_get_all_empty_table() {
        let repo = Repository::<Person>::with_connection(memory_connection().await);
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_returns_every_row() {
        let repo = seeded().await;

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(names, vec!["Marry", "John", "Doe"]);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = seeded().await;

        let marry = repo.get(1).await.unwrap().unwrap();
        assert_eq!(marry.name, "Marry");
        assert_eq!(marry.id, 1);

        assert!(repo.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_identity() {
        let repo = seeded().await;

        let mut joe = Person::new("Joe");
        let id = repo.insert(&mut joe).await.unwrap();

        assert!(id > 0);
        assert_eq!(joe.id, id);

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 4);

        let stored = all.iter().find(|p| p.name == "Joe").unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.audit, joe.audit);
    }

    #[tokio::test]
    async fn test_update_persists_fields() {
        let repo = seeded().await;

        let mut marry = repo.get(1).await.unwrap().unwrap();
        marry.name = "Steve".to_string();
        marry.audit.touch();

        assert!(repo.update(&marry).await.unwrap());

        let stored = repo.get(1).await.unwrap().unwrap();
        assert_eq!(stored.name, "Steve");
        assert_eq!(stored.audit, marry.audit);
    }

    #[tokio::test]
    async fn test_update_missing_row_reports_nothing_changed() {
        let repo = seeded().await;

        let mut ghost = Person::new("Ghost");
        ghost.id = 999;

        assert!(!repo.update(&ghost).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unpersisted_entity_changes_nothing() {
        let repo = seeded().await;

        let nobody = Person::new("Nobody");
        assert!(nobody.is_new());
        assert!(!repo.update(&nobody).await.unwrap());

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Marry", "John", "Doe"]);
    }

    #[tokio::test]
    async fn test_delete_returns_deleted_entity() {
        let repo = seeded().await;

        let deleted = repo.delete(1).await.unwrap().unwrap();
        assert_eq!(deleted.name, "Marry");

        let remaining = repo.get_all().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|p| p.id != 1));
    }

    #[tokio::test]
    async fn test_delete_missing_row_is_none() {
        let repo = seeded().await;

        assert!(repo.delete(999).await.unwrap().is_none());
        assert_eq!(repo.get_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_close_releases_connection_once() {
        let connection = memory_connection().await;
        let repo = Repository::<Person>::with_connection(connection.clone());

        repo.close().await.unwrap();
        assert!(repo.connection().is_none());
        assert!(!connection.is_open().await);

        // Second close, and close on an unbound repository, are no-ops
        repo.close().await.unwrap();
        Repository::<Person>::new().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_connection_rebinds() {
        let first = memory_connection().await;
        let second = memory_connection().await;
        let repo = Repository::<Person>::with_connection(first.clone());

        repo.set_connection(second.clone());
        assert_eq!(repo.connection().unwrap().id(), second.id());

        // Idempotent
        repo.set_connection(second.clone());
        assert_eq!(repo.connection().unwrap().id(), second.id());
    }
}
