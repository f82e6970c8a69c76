//! Shared fixtures for unit tests.

use chrono::Utc;

use crate::cart::CartItem;
use crate::ledger::ChartOfAccounts;
use crate::money::Money;
use crate::sale::{SaleContext, SaleEngine, SaleRequest};
use crate::settings::{LoyaltySettings, Settings};
use crate::shift::{Shift, ShiftManager};
use crate::state::PosState;
use crate::types::{Customer, Payment, Product, Sale};

pub const CASHIER: &str = "cashier-1";

pub fn settings() -> Settings {
    Settings::default()
}

pub fn loyalty_settings() -> Settings {
    Settings {
        loyalty: LoyaltySettings {
            enabled: true,
            ..LoyaltySettings::default()
        },
        ..Settings::default()
    }
}

/// A tracked, tax-inclusive product priced in whole currency units.
pub fn product(id: &str, sku: &str, price: i64, cost: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: format!("Item {}", sku),
        price: Money::from_major(price),
        cost_price: Money::from_major(cost),
        pricing_type: None,
        track_inventory: true,
        stock,
        reserved_stock: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn customer(id: &str, points: i64) -> Customer {
    Customer {
        id: id.to_string(),
        name: format!("Customer {}", id),
        phone: Some("+254700000000".to_string()),
        loyalty_points: points,
        created_at: Utc::now(),
    }
}

pub fn state_with(products: Vec<Product>) -> PosState {
    let mut state = PosState::new(ChartOfAccounts::standard());
    for p in products {
        state.products.insert(p.id.clone(), p);
    }
    state
}

pub fn open_shift(state: &mut PosState, user_id: &str, float: Money) -> Shift {
    let outcome = ShiftManager::new()
        .start_shift(state, user_id, float)
        .unwrap();
    state.commit(outcome.changes).unwrap();
    outcome.record
}

/// Sells `qty` of `product_id` for cash and commits it.
pub fn cash_sale(
    state: &mut PosState,
    settings: &Settings,
    product_id: &str,
    qty: i64,
    tendered: Money,
) -> Sale {
    let item = CartItem::from_product(state.product(product_id).unwrap(), qty);
    let outcome = SaleEngine::new(settings)
        .complete_sale(
            state,
            SaleRequest::new(
                vec![item],
                vec![Payment::cash(tendered)],
                SaleContext::standard(CASHIER),
            ),
        )
        .unwrap();
    state.commit(outcome.changes).unwrap();
    outcome.record
}
