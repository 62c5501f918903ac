//! # keel-core: Entity Contract for Keel
//!
//! Pure types shared by every layer: the [`Entity`] trait, the [`Audit`]
//! stamps and the [`EntityType`] token used to key repository registries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Keel Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ keel-core (THIS CRATE) ★                        │   │
//! │  │      Entity  •  Audit  •  EntityType  •  EntityId               │   │
//! │  │      NO I/O • NO DATABASE • NO NETWORK                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    keel-db (Database Layer)                     │   │
//! │  │       Repository<T>, UnitOfWork, connection provider           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `sqlx` - derives `sqlx::FromRow` for [`Audit`] so entities can
//!   `#[sqlx(flatten)]` it.

pub mod entity;

pub use entity::{Audit, Entity, EntityId, EntityType, UNSET_ID};
