//! Fixed CRUD statements for one entity type.

use keel_core::Entity;

const ID: &str = "Id";
const CREATED: &str = "Created";
const LAST_MODIFIED: &str = "LastModified";

/// SQL text for the five repository operations of one entity type.
///
/// Bind order for `insert` is `COLUMNS.., Created, LastModified`; for
/// `update` it is the same followed by `Id`.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub select_all: String,
    pub select_by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl Statements {
    pub fn for_entity<T: Entity>() -> Self {
        let table = quote(T::TABLE);
        let id = quote(ID);

        let columns: Vec<String> = T::COLUMNS
            .iter()
            .chain([CREATED, LAST_MODIFIED].iter())
            .map(|column| quote(column))
            .collect();

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();

        Statements {
            select_all: format!("SELECT * FROM {}", table),
            select_by_id: format!("SELECT * FROM {} WHERE {} = ?1", table, id),
            insert: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            update: format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                table,
                assignments.join(", "),
                id,
                columns.len() + 1
            ),
            delete: format!("DELETE FROM {} WHERE {} = ?1", table, id),
        }
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Audit, EntityId};

    #[derive(Debug, Clone)]
    struct Book {
        id: EntityId,
        audit: Audit,
    }

    impl Entity for Book {
        const TABLE: &'static str = "Book";
        const COLUMNS: &'static [&'static str] = &["Title", "Pages"];

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

    #[test]
    fn test_statements_for_entity() {
        let sql = Statements::for_entity::<Book>();

        assert_eq!(sql.select_all, r#"SELECT * FROM "Book""#);
        assert_eq!(sql.select_by_id, r#"SELECT * FROM "Book" WHERE "Id" = ?1"#);
        assert_eq!(
            sql.insert,
            r#"INSERT INTO "Book" ("Title", "Pages", "Created", "LastModified") VALUES (?1, ?2, ?3, ?4)"#
        );
        assert_eq!(
            sql.update,
            r#"UPDATE "Book" SET "Title" = ?1, "Pages" = ?2, "Created" = ?3, "LastModified" = ?4 WHERE "Id" = ?5"#
        );
        assert_eq!(sql.delete, r#"DELETE FROM "Book" WHERE "Id" = ?1"#);
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("Odd\"Name"), "\"Odd\"\"Name\"");
    }
}
