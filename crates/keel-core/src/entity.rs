//! # Entity Contract
//!
//! The shape every persistable record type must satisfy.
//!
//! ## Row Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Table Per Entity Type                           │
//! │                                                                         │
//! │  Table name = Entity::TABLE (case-sensitive, usually the type name)    │
//! │                                                                         │
//! │  ┌──────────┬────────────────────────────┬──────────┬──────────────┐   │
//! │  │    Id    │  Entity::COLUMNS ...       │ Created  │ LastModified │   │
//! │  ├──────────┼────────────────────────────┼──────────┼──────────────┤   │
//! │  │ INTEGER  │  entity-specific fields    │ DateTime │  DateTime    │   │
//! │  │ PK AUTO  │                            │  (UTC)   │   (UTC)      │   │
//! │  └──────────┴────────────────────────────┴──────────┴──────────────┘   │
//! │       ▲                                        ▲                        │
//! │       │                                        │                        │
//! │  assigned by the store on insert      stamped by the entity itself     │
//! │  (0 = not yet persisted)              (never by a repository)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Store-assigned identity of an entity row.
pub type EntityId = i64;

/// Identity of an entity that has not been inserted yet.
pub const UNSET_ID: EntityId = 0;

// =============================================================================
// Audit Stamps
// =============================================================================

/// Creation and last-modification timestamps carried by every entity.
///
/// ## Usage
/// ```rust
/// use keel_core::Audit;
///
/// let mut audit = Audit::now();
/// let created = audit.created;
/// audit.touch();
/// assert_eq!(audit.created, created);
/// assert!(audit.last_modified >= created);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Audit {
    /// When the entity instance was constructed.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Created"))]
    pub created: DateTime<Utc>,

    /// When the entity was last changed by its owner.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "LastModified"))]
    pub last_modified: DateTime<Utc>,
}

impl Audit {
    /// Stamps both fields with the current UTC time.
    pub fn now() -> Self {
        let now = Utc::now();
        Audit {
            created: now,
            last_modified: now,
        }
    }

    /// Moves `last_modified` to the current UTC time.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

impl Default for Audit {
    fn default() -> Self {
        Audit::now()
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A persistable record type with an identity and audit timestamps.
///
/// ## Implementing
/// ```rust
/// use keel_core::{Audit, Entity, EntityId, UNSET_ID};
///
/// #[derive(Debug, Clone)]
/// struct Customer {
///     id: EntityId,
///     name: String,
///     audit: Audit,
/// }
///
/// impl Customer {
///     fn new(name: &str) -> Self {
///         Customer { id: UNSET_ID, name: name.to_string(), audit: Audit::now() }
///     }
/// }
///
/// impl Entity for Customer {
///     const TABLE: &'static str = "Customer";
///     const COLUMNS: &'static [&'static str] = &["Name"];
///
///     fn id(&self) -> EntityId { self.id }
///     fn set_id(&mut self, id: EntityId) { self.id = id; }
///     fn audit(&self) -> &Audit { &self.audit }
/// }
///
/// let customer = Customer::new("Joe");
/// assert!(customer.is_new());
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// Table holding rows of this type.
    const TABLE: &'static str;

    /// Entity-specific mutable columns, in bind order.
    ///
    /// Excludes `Id`, `Created` and `LastModified`.
    const COLUMNS: &'static [&'static str];

    /// Returns the store-assigned identity ([`UNSET_ID`] before insert).
    fn id(&self) -> EntityId;

    /// Records the identity assigned by the store.
    fn set_id(&mut self, id: EntityId);

    /// Returns the audit stamps.
    fn audit(&self) -> &Audit;

    /// Returns true if this instance has not been persisted yet.
    fn is_new(&self) -> bool {
        self.id() == UNSET_ID
    }
}

// =============================================================================
// Entity Type Token
// =============================================================================

/// Static type token for an entity type.
///
/// Used as the key of repository registries. Two tokens are equal when they
/// name the same Rust type; `name` is only carried for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    type_id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Returns the token for `T`.
    pub fn of<T: Entity>() -> Self {
        EntityType {
            type_id: TypeId::of::<T>(),
            name: T::TABLE,
        }
    }

    /// Returns the table name of the entity type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this token names `T`.
    pub fn is<T: Entity>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
