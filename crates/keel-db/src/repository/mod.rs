//! # Repository Module
//!
//! The CRUD capability set shared by every repository, and its SQLite
//! implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  uow.repository::<Customer>()?.get(1).await                    │
//! │       ▼                                                                 │
//! │  dyn CrudRepository<Entity = Customer>                                 │
//! │  ├── get_all(&self)                                                    │
//! │  ├── get(&self, id)                                                    │
//! │  ├── insert(&self, &mut entity)                                        │
//! │  ├── update(&self, &entity)                                            │
//! │  └── delete(&self, id)                                                 │
//! │       │                                                                 │
//! │       │  Fixed per-entity SQL, bound connection                        │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Repository<T>        - uses whatever connection it is bound to        │
//! │  ScopedRepository<T>  - opens and closes a connection per call         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold no transaction logic. A transaction started on the
//! connection they are bound to covers their statements.

use async_trait::async_trait;
use keel_core::{Entity, EntityId, EntityType};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::FromRow;

use crate::error::DbResult;

pub mod generic;
pub mod scoped;
mod statements;

pub use generic::Repository;
pub use scoped::ScopedRepository;

// =============================================================================
// Capability Set
// =============================================================================

/// CRUD operations for one entity type.
///
/// Object safe: the unit of work hands out
/// `Arc<dyn CrudRepository<Entity = T>>`, never a concrete type.
#[async_trait]
pub trait CrudRepository: Send + Sync {
    /// Entity type this repository persists.
    type Entity: Entity;

    /// Returns the static type token for [`Self::Entity`].
    fn entity_type(&self) -> EntityType {
        EntityType::of::<Self::Entity>()
    }

    /// Returns every row. An empty table yields an empty vector.
    async fn get_all(&self) -> DbResult<Vec<Self::Entity>>;

    /// Returns the row with this identity, or `None` if there is none.
    async fn get(&self, id: EntityId) -> DbResult<Option<Self::Entity>>;

    /// Persists a new row and lets the store assign its identity.
    ///
    /// The generated identity is returned and written into `entity`.
    async fn insert(&self, entity: &mut Self::Entity) -> DbResult<EntityId>;

    /// Persists all mutable fields of an existing row, keyed by its identity.
    ///
    /// Returns whether a row was changed. An entity that was never inserted
    /// matches no row and yields `false`.
    async fn update(&self, entity: &Self::Entity) -> DbResult<bool>;

    /// Deletes the row with this identity.
    ///
    /// Returns the deleted entity, or `None` if no row matched or the
    /// delete had no effect.
    async fn delete(&self, id: EntityId) -> DbResult<Option<Self::Entity>>;
}

/// A repository whose connection can be replaced after construction.
///
/// This is what lets a unit of work point several repositories at the one
/// connection it owns.
pub trait BindConnection<C>: Send + Sync {
    /// Rebinds to `connection`. No validation; rebinding to the same
    /// connection has no further effect.
    fn set_connection(&self, connection: C);

    /// Returns the currently bound connection, if any.
    fn connection(&self) -> Option<C>;
}

// =============================================================================
// SQLite Row Mapping
// =============================================================================

/// Query type entity columns are bound onto.
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// An [`Entity`] that maps to and from SQLite rows.
///
/// ## Implementing
/// ```rust,ignore
/// #[derive(Debug, Clone, sqlx::FromRow)]
/// struct Customer {
///     #[sqlx(rename = "Id")]
///     id: EntityId,
///     #[sqlx(rename = "Name")]
///     name: String,
///     #[sqlx(flatten)]
///     audit: Audit,
/// }
///
/// impl Record for Customer {
///     fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
///         query.bind(&self.name)
///     }
/// }
/// ```
pub trait Record: Entity + for<'r> FromRow<'r, SqliteRow> + Unpin {
    /// Binds the values of [`Entity::COLUMNS`], in that order.
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}
