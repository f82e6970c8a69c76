//! # Seed Data Generator
//!
//! Creates a development database with the standard chart of accounts and
//! a small shelf of demo products.
//!
//! ## Usage
//! ```bash
//! # Default path ./duka_dev.db
//! cargo run -p duka-db --bin seed
//!
//! # Custom path, either way
//! DUKA_DB_PATH=./data/duka.db cargo run -p duka-db --bin seed
//! cargo run -p duka-db --bin seed -- --db ./data/duka.db
//!
//! # More detail
//! RUST_LOG=duka_db=debug cargo run -p duka-db --bin seed
//! ```

use std::env;

use chrono::Utc;
use duka_core::ledger::ChartOfAccounts;
use duka_core::{Customer, Money, Product, Settings, TaxMode};
use duka_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (sku, name, price, cost, stock, pricing override) in whole shillings.
const PRODUCTS: &[(&str, &str, i64, i64, i64, Option<TaxMode>)] = &[
    ("MILK-500ML", "Fresh Milk 500ml", 60, 45, 120, None),
    ("BREAD-400G", "White Bread 400g", 65, 50, 80, None),
    ("SUGAR-1KG", "Sugar 1kg", 180, 150, 60, None),
    ("FLOUR-2KG", "Maize Flour 2kg", 210, 175, 75, None),
    ("RICE-1KG", "Pishori Rice 1kg", 250, 200, 40, None),
    ("OIL-1L", "Cooking Oil 1L", 390, 320, 36, None),
    ("SOAP-800G", "Bar Soap 800g", 220, 170, 48, Some(TaxMode::Exclusive)),
    ("AIRTIME-100", "Airtime 100", 100, 97, 0, None),
    ("PHONE-CASE", "Phone Case", 800, 450, 15, Some(TaxMode::Exclusive)),
    ("CHARGER-USB", "USB Charger", 1200, 700, 10, None),
];

fn demo_product(sku: &str, name: &str, price: i64, cost: i64, stock: i64, pricing: Option<TaxMode>) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: name.to_string(),
        price: Money::from_major(price),
        cost_price: Money::from_major(cost),
        pricing_type: pricing,
        // Airtime is a service line; everything else is counted stock
        track_inventory: stock > 0,
        stock,
        reserved_stock: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = env::var("DUKA_DB_PATH").unwrap_or_else(|_| String::from("./duka_dev.db"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    db_path = path.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Duka POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $DUKA_DB_PATH or ./duka_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected, migrations applied");

    let products = db.collection::<Product>();
    let existing = products.count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products; delete the file to regenerate"
        );
        return Ok(());
    }

    let chart = ChartOfAccounts::standard();
    db.save_chart(&chart).await?;
    db.save_settings(&Settings::default()).await?;

    for &(sku, name, price, cost, stock, pricing) in PRODUCTS {
        products
            .save(&demo_product(sku, name, price, cost, stock, pricing))
            .await?;
    }

    let regular = Customer {
        id: Uuid::new_v4().to_string(),
        name: "Amina Wanjiru".to_string(),
        phone: Some("+254711000111".to_string()),
        loyalty_points: 0,
        created_at: Utc::now(),
    };
    db.collection::<Customer>().save(&regular).await?;

    // Round-trip through the loader so a bad seed fails here, not at the till
    let state = db.load_state().await?;
    let settings = db.load_settings().await?;
    info!(
        currency = %settings.currency_code,
        accounts = state.ledger.chart().len(),
        products = state.products.len(),
        customers = state.customers.len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
