//! # Domain Types
//!
//! Core domain records shared by every service.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  method         │       │
//! │  │  sku (business) │   │  receipt_number │   │  amount         │       │
//! │  │  price / cost   │   │  items, totals  │   │  reference      │       │
//! │  │  stock/reserved │   │  shift_id, link │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │    TaxMode      │   │ PaymentMethod   │       │
//! │  │  bps (u32)      │   │  Inclusive      │   │  Cash           │       │
//! │  │  1600 = 16%     │   │  Exclusive      │   │  MobileMoney    │       │
//! │  └─────────────────┘   └─────────────────┘   │  Card, Bank     │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for references between records
//! - Business ID: (sku, receipt_number, etc.) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1600 bps = 16% (Kenyan standard VAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Mode
// =============================================================================

/// Whether a listed price already contains VAT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Price + VAT shown separately.
    Exclusive,
    /// Price includes VAT (shelf price is what the customer pays).
    #[default]
    Inclusive,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// ## Stock Invariants
/// - `stock >= 0` after every deduction
/// - `reserved_stock <= stock`
///
/// `reserved_stock` counts units earmarked by open sales orders; only
/// `stock - reserved_stock` may be sold over the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Shelf price per unit.
    pub price: Money,

    /// Purchase cost per unit (drives cost of goods sold).
    pub cost_price: Money,

    /// Overrides the store-wide pricing mode when set.
    pub pricing_type: Option<TaxMode>,

    /// Whether to track inventory for this product.
    pub track_inventory: bool,

    /// Units on hand.
    pub stock: i64,

    /// Units earmarked by open sales orders.
    pub reserved_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Units that can be sold without touching reservations.
    #[inline]
    pub fn available_stock(&self) -> i64 {
        self.stock - self.reserved_stock
    }

    /// Checks if `quantity` units can be sold over the counter.
    pub fn can_sell(&self, quantity: i64) -> bool {
        !self.track_inventory || self.available_stock() >= quantity
    }

    /// Resolves the pricing mode against the store default.
    #[inline]
    pub fn pricing(&self, default: TaxMode) -> TaxMode {
        self.pricing_type.unwrap_or(default)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer with a loyalty balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Points available for redemption.
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a customer paid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Notes and coins into the drawer.
    Cash,
    /// Mobile money (M-Pesa, Airtel Money).
    MobileMoney,
    /// Card on an external terminal, settled to the bank.
    Card,
    /// Direct bank transfer.
    BankTransfer,
}

impl PaymentMethod {
    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One tender towards a sale. A sale can have several (split tender).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub method: PaymentMethod,
    /// Amount handed over. For cash this may exceed what is owed.
    pub amount: Money,
    /// External reference (M-Pesa code, card auth code).
    pub reference: Option<String>,
}

impl Payment {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        Payment {
            method,
            amount,
            reference: None,
        }
    }

    pub fn cash(amount: Money) -> Self {
        Payment::new(PaymentMethod::Cash, amount)
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

// =============================================================================
// Instrument Reference
// =============================================================================

/// Weak reference from a sale to the deferred instrument it pays into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InstrumentRef {
    Layaway(String),
    WorkOrder(String),
    SalesOrder(String),
}

impl InstrumentRef {
    pub fn id(&self) -> &str {
        match self {
            InstrumentRef::Layaway(id)
            | InstrumentRef::WorkOrder(id)
            | InstrumentRef::SalesOrder(id) => id,
        }
    }

    /// Human-readable kind, used in synthetic line names and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentRef::Layaway(_) => "Layaway",
            InstrumentRef::WorkOrder(_) => "Work order",
            InstrumentRef::SalesOrder(_) => "Sales order",
        }
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a finalized sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub quantity: i64,
    /// Shelf price at time of sale (frozen).
    pub unit_price: Money,
    /// Cost at time of sale (frozen).
    pub unit_cost: Money,
    pub pricing: TaxMode,
    pub track_inventory: bool,
    /// Discount entered on this line.
    pub line_discount: Money,
    /// This line's share of the cart-level discount.
    pub cart_discount: Money,
    /// Amount charged for the line, in listed-price terms, after discounts.
    pub gross: Money,
    /// Taxable amount (excluding VAT).
    pub net: Money,
    pub tax: Money,
}

impl SaleLine {
    /// Extended cost of the units sold.
    #[inline]
    pub fn cost(&self) -> Money {
        self.unit_cost * self.quantity
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A finalized sale.
///
/// Created exactly once per completion call and never mutated afterwards.
/// The ledger reference is known before commit, so it is set at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub items: Vec<SaleLine>,
    pub payments: Vec<Payment>,
    /// Σ unit_price × quantity, before any discount.
    pub subtotal: Money,
    /// Line discounts plus cart discount.
    pub discount_amount: Money,
    pub taxable_amount: Money,
    pub tax: Money,
    /// Value of loyalty points redeemed.
    pub points_value: Money,
    /// Amount already paid towards this purchase by earlier sales.
    pub deposit_applied: Money,
    /// Amount due on this sale.
    pub total: Money,
    /// Σ payments.amount
    pub amount_paid: Money,
    /// Cash handed back to the customer.
    pub change: Money,
    pub customer_id: Option<String>,
    pub points_earned: i64,
    pub points_used: i64,
    pub points_balance_after: Option<i64>,
    pub link: Option<InstrumentRef>,
    pub shift_id: String,
    pub user_id: String,
    pub ledger_transaction_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Σ cash tendered on this sale.
    pub fn cash_tendered(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.method.is_cash())
            .map(|p| p.amount)
            .sum()
    }

    /// Cash that stayed in the drawer (tendered minus change).
    pub fn cash_retained(&self) -> Money {
        self.cash_tendered() - self.change
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1600);
        assert_eq!(rate.bps(), 1600);
        assert!((rate.percentage() - 16.0).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(8.25).bps(), 825);
    }

    #[test]
    fn test_tax_mode_default_is_inclusive() {
        assert_eq!(TaxMode::default(), TaxMode::Inclusive);
    }

    #[test]
    fn test_available_stock_respects_reservations() {
        let now = Utc::now();
        let product = Product {
            id: "p-1".into(),
            sku: "RICE-1KG".into(),
            barcode: None,
            name: "Rice 1kg".into(),
            price: Money::from_major(180),
            cost_price: Money::from_major(140),
            pricing_type: None,
            track_inventory: true,
            stock: 10,
            reserved_stock: 4,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(product.available_stock(), 6);
        assert!(product.can_sell(6));
        assert!(!product.can_sell(7));
        assert_eq!(product.pricing(TaxMode::Exclusive), TaxMode::Exclusive);
    }

    #[test]
    fn test_instrument_ref_serializes_tagged() {
        let link = InstrumentRef::SalesOrder("so-1".into());
        let json = serde_json::to_string(&link).unwrap();
        assert_eq!(json, r#"{"kind":"sales_order","id":"so-1"}"#);
        assert_eq!(link.id(), "so-1");
    }
}
