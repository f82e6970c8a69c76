//! Record fixtures for store tests.

use chrono::Utc;
use duka_core::{Customer, Money, Product};

pub fn product(id: &str, sku: &str, price: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: format!("Item {}", sku),
        price: Money::from_major(price),
        cost_price: Money::from_major(price * 3 / 4),
        pricing_type: None,
        track_inventory: true,
        stock,
        reserved_stock: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn customer(id: &str) -> Customer {
    Customer {
        id: id.to_string(),
        name: format!("Customer {}", id),
        phone: None,
        loyalty_points: 0,
        created_at: Utc::now(),
    }
}
