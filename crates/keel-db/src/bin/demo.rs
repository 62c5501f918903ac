//! # Unit of Work Demo
//!
//! Runs two repositories through one unit of work: a committed transaction,
//! then a rolled-back one.
//!
//! ## Usage
//! ```bash
//! # In-memory database (default)
//! cargo run -p keel-db --bin demo
//!
//! # Keep the data in a file
//! cargo run -p keel-db --bin demo -- --db ./keel_demo.db
//!
//! # Read provider and connection string from TOML
//! cargo run -p keel-db --bin demo -- --config ./keel.toml
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use keel_db::logging::{init_tracing, DEFAULT_FILTER};
use keel_db::{
    Audit, CrudRepository, DbConfig, DbError, Entity, EntityId, Record, Repository,
    SharedConnection, SqliteConnectionProvider, SqliteQuery, UnitOfWork, UnitOfWorkBuilder,
    UNSET_ID,
};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "Customer" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "Name" TEXT NOT NULL,
    "Email" TEXT NOT NULL UNIQUE,
    "Created" TEXT NOT NULL,
    "LastModified" TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS "Order" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "CustomerId" INTEGER NOT NULL REFERENCES "Customer"("Id"),
    "TotalCents" INTEGER NOT NULL,
    "Created" TEXT NOT NULL,
    "LastModified" TEXT NOT NULL
);
"#;

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct Customer {
    #[sqlx(rename = "Id")]
    id: EntityId,
    #[sqlx(rename = "Name")]
    name: String,
    #[sqlx(rename = "Email")]
    email: String,
    #[sqlx(flatten)]
    audit: Audit,
}

impl Customer {
    fn new(name: &str, email: &str) -> Self {
        Customer {
            id: UNSET_ID,
            name: name.to_string(),
            email: email.to_string(),
            audit: Audit::now(),
        }
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "Customer";
    const COLUMNS: &'static [&'static str] = &["Name", "Email"];

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

impl Record for Customer {
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.name).bind(&self.email)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct Order {
    #[sqlx(rename = "Id")]
    id: EntityId,
    #[sqlx(rename = "CustomerId")]
    customer_id: EntityId,
    #[sqlx(rename = "TotalCents")]
    total_cents: i64,
    #[sqlx(flatten)]
    audit: Audit,
}

impl Order {
    fn new(customer_id: EntityId, total_cents: i64) -> Self {
        Order {
            id: UNSET_ID,
            customer_id,
            total_cents,
            audit: Audit::now(),
        }
    }
}

impl Entity for Order {
    const TABLE: &'static str = "Order";
    const COLUMNS: &'static [&'static str] = &["CustomerId", "TotalCents"];

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

impl Record for Order {
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(self.customer_id).bind(self.total_cents)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(DEFAULT_FILTER);

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Keel Unit of Work Demo");
                println!();
                println!("Usage: demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       SQLite file (default: in-memory)");
                println!("  -c, --config <PATH>   TOML file with provider_name and connection_string");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = DbConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config = DbConfig::sqlite(format!("sqlite://{}?mode=rwc", path));
    }

    println!("Keel Unit of Work Demo");
    println!("======================");
    println!("Provider:   {}", config.provider_name);
    println!("Connection: {}", config.connection_string);
    println!();

    let provider = Arc::new(SqliteConnectionProvider::new(config));
    let customers = Arc::new(Repository::<Customer>::new());
    let orders = Arc::new(Repository::<Order>::new());

    let mut uow = UnitOfWorkBuilder::new()
        .provider(provider)
        .repository(customers)
        .repository(orders)
        .build()
        .await?;

    let result = run(&mut uow).await;

    // Release the connection whatever happened
    uow.dispose().await;

    result?;
    println!();
    println!("✓ Demo complete!");
    Ok(())
}

async fn run(uow: &mut UnitOfWork<SharedConnection>) -> Result<(), DbError> {
    let connection = uow.connection().ok_or(DbError::NotBound)?;
    connection.execute_batch(SCHEMA).await?;
    println!("✓ Schema ready");

    let customers = uow
        .repository::<Customer>()
        .ok_or_else(|| DbError::Internal("customer repository not registered".into()))?;
    let orders = uow
        .repository::<Order>()
        .ok_or_else(|| DbError::Internal("order repository not registered".into()))?;

    // Committed: a customer and two orders land together
    uow.begin_transaction().await?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let mut joe = Customer::new("Joe", &format!("joe+{}@example.com", stamp));
    let joe_id = customers.insert(&mut joe).await?;
    orders.insert(&mut Order::new(joe_id, 1_299)).await?;
    orders.insert(&mut Order::new(joe_id, 4_550)).await?;

    uow.commit().await?;
    info!(customer = joe_id, "Committed customer with orders");
    println!("✓ Committed customer #{} with 2 orders", joe_id);

    // Rolled back: neither the rename nor the new order survives
    uow.begin_transaction().await?;

    joe.name = "Joseph".to_string();
    joe.audit.touch();
    customers.update(&joe).await?;
    orders.insert(&mut Order::new(joe_id, 99)).await?;

    uow.rollback().await?;
    println!("✓ Rolled back rename and third order");

    println!();
    println!("Customers:");
    for customer in customers.get_all().await? {
        println!(
            "  #{} {} <{}> (created {})",
            customer.id,
            customer.name,
            customer.email,
            customer.audit.created.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("Orders:");
    for order in orders.get_all().await? {
        println!(
            "  #{} customer #{} ${}.{:02}",
            order.id,
            order.customer_id,
            order.total_cents / 100,
            order.total_cents % 100
        );
    }

    Ok(())
}
