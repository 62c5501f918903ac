//! Shared fixtures for the crate's unit tests.

use keel_core::{Audit, Entity, EntityId, UNSET_ID};

use crate::config::DbConfig;
use crate::connection::ConnectionProvider;
use crate::repository::{CrudRepository, Record, SqliteQuery};
use crate::sqlite::{SharedConnection, SqliteConnectionProvider};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "Person" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "Name" TEXT NOT NULL,
    "Created" TEXT NOT NULL,
    "LastModified" TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS "Tag" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "Label" TEXT NOT NULL UNIQUE,
    "Created" TEXT NOT NULL,
    "LastModified" TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Person {
    #[sqlx(rename = "Id")]
    pub id: EntityId,
    #[sqlx(rename = "Name")]
    pub name: String,
    #[sqlx(flatten)]
    pub audit: Audit,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Person {
            id: UNSET_ID,
            name: name.to_string(),
            audit: Audit::now(),
        }
    }
}

impl Entity for Person {
    const TABLE: &'static str = "Person";
    const COLUMNS: &'static [&'static str] = &["Name"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

impl Record for Person {
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Tag {
    #[sqlx(rename = "Id")]
    pub id: EntityId,
    #[sqlx(rename = "Label")]
    pub label: String,
    #[sqlx(flatten)]
    pub audit: Audit,
}

impl Tag {
    pub fn new(label: &str) -> Self {
        Tag {
            id: UNSET_ID,
            label: label.to_string(),
            audit: Audit::now(),
        }
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "Tag";
    const COLUMNS: &'static [&'static str] = &["Label"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

impl Record for Tag {
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.label)
    }
}

/// Opens a fresh in-memory database with the test schema.
pub async fn memory_connection() -> SharedConnection {
    let connection = SqliteConnectionProvider::new(DbConfig::in_memory())
        .get_connection()
        .await
        .unwrap();
    connection.execute_batch(SCHEMA).await.unwrap();
    connection
}

/// Inserts Marry (1), John (2) and Doe (3).
pub async fn seed_people<R>(repo: &R)
where
    R: CrudRepository<Entity = Person> + ?Sized,
{
    for name in ["Marry", "John", "Doe"] {
        repo.insert(&mut Person::new(name)).await.unwrap();
    }
}
