//! # Cart Totals
//!
//! Cart lines and the arithmetic that turns them into sale totals.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        compute_totals()                                 │
//! │                                                                         │
//! │  unit_price × qty ───► − line discount ───► − share of cart discount   │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                                         line gross (listed terms)       │
//! │                                                   │                     │
//! │                  ┌────────────────────────────────┴──────────────┐      │
//! │                  ▼                                               ▼      │
//! │      Inclusive lines (Σgross)                       Exclusive lines     │
//! │      split_inclusive(vat)                           tax = Σnet × vat    │
//! │                  │                                               │      │
//! │                  └──────────────► taxable, tax ◄─────────────────┘      │
//! │                                                                         │
//! │  total = taxable + tax   (points and deposits are applied by the sale) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tax is computed once per pricing mode over the summed amounts and then
//! allocated back onto lines, so inclusive carts always total exactly the
//! shelf prices and exclusive tax is exactly `taxable × rate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::settings::Settings;
use crate::types::{Product, SaleLine, TaxMode};
use crate::validation::{
    validate_cart_size, validate_description, validate_discount, validate_price,
    validate_quantity, validate_tax_rate_bps,
};

/// Product id carried by synthetic service lines.
pub const SERVICE_PRODUCT_ID: &str = "service";

// =============================================================================
// Cart Item
// =============================================================================

/// An item in the shopping cart.
///
/// Product data is frozen when the item is created, so later price or cost
/// changes do not affect a cart in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    /// `None` follows the store-wide pricing mode.
    pub pricing: Option<TaxMode>,
    pub track_inventory: bool,
    pub quantity: i64,
    /// Discount on the whole line (not per unit).
    pub line_discount: Money,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Snapshots `product` at its current price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            unit_cost: product.cost_price,
            pricing: product.pricing_type,
            track_inventory: product.track_inventory,
            quantity,
            line_discount: Money::zero(),
            added_at: Utc::now(),
        }
    }

    /// A single tax-inclusive, non-inventory line for `amount`.
    ///
    /// Deposits and installments are sold as one of these.
    pub fn service(name: impl Into<String>, amount: Money) -> Self {
        CartItem {
            product_id: SERVICE_PRODUCT_ID.to_string(),
            sku: "SERVICE".to_string(),
            name: name.into(),
            unit_price: amount,
            unit_cost: Money::zero(),
            pricing: Some(TaxMode::Inclusive),
            track_inventory: false,
            quantity: 1,
            line_discount: Money::zero(),
            added_at: Utc::now(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.line_discount = discount;
        self
    }

    /// Unit price × quantity, before discounts.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart Discount
// =============================================================================

/// Discount applied to the cart as a whole, after line discounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CartDiscount {
    #[default]
    None,
    /// Fixed amount off.
    Amount(Money),
    /// Basis points off (1000 = 10%).
    Percentage(u32),
}

impl CartDiscount {
    /// Resolves the discount against the cart's post-line-discount gross.
    fn resolve(&self, gross: Money) -> CoreResult<Money> {
        let amount = match *self {
            CartDiscount::None => Money::zero(),
            CartDiscount::Amount(amount) => amount,
            CartDiscount::Percentage(bps) => {
                validate_tax_rate_bps(bps).map_err(|_| ValidationError::OutOfRange {
                    field: "cart discount".to_string(),
                    min: 0,
                    max: 10_000,
                })?;
                gross.percentage(bps)
            }
        };
        validate_discount("cart discount", amount, gross)?;
        Ok(amount)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Totals for a cart, with per-line breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleTotals {
    pub lines: Vec<SaleLine>,
    /// Σ unit_price × quantity.
    pub subtotal: Money,
    /// Line discounts plus cart discount.
    pub discount_amount: Money,
    pub taxable_amount: Money,
    pub tax: Money,
    /// taxable + tax, before loyalty redemption and deposits.
    pub total: Money,
}

impl SaleTotals {
    /// Extended cost of inventory-tracked lines.
    pub fn inventory_cost(&self) -> Money {
        self.lines
            .iter()
            .filter(|l| l.track_inventory)
            .map(SaleLine::cost)
            .sum()
    }
}

/// Computes totals for `items` under the store's VAT settings.
pub fn compute_totals(
    items: &[CartItem],
    cart_discount: &CartDiscount,
    settings: &Settings,
) -> CoreResult<SaleTotals> {
    validate_cart_size(items.len())?;

    let mut subtotal = Money::zero();
    let mut line_discounts = Money::zero();
    let mut after_line: Vec<Money> = Vec::with_capacity(items.len());

    for item in items {
        validate_description("item name", &item.name)?;
        validate_quantity(item.quantity)?;
        validate_price(item.unit_price)?;
        let line_total = item.line_total();
        validate_discount("line discount", item.line_discount, line_total)?;

        subtotal += line_total;
        line_discounts += item.line_discount;
        after_line.push(line_total - item.line_discount);
    }

    let cart_gross: Money = after_line.iter().sum();
    let cart_discount = cart_discount.resolve(cart_gross)?;
    let shares = cart_discount.allocate(&after_line);

    let pricings: Vec<TaxMode> = items
        .iter()
        .map(|i| i.pricing.unwrap_or(settings.tax_mode))
        .collect();
    let grosses: Vec<Money> = after_line
        .iter()
        .zip(&shares)
        .map(|(gross, share)| *gross - *share)
        .collect();

    // Tax per pricing mode over the summed amounts, then spread over lines.
    let line_tax = allocate_tax(&grosses, &pricings, settings);

    let lines: Vec<SaleLine> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let gross = grosses[i];
            let tax = line_tax[i];
            let net = match pricings[i] {
                TaxMode::Inclusive => gross - tax,
                TaxMode::Exclusive => gross,
            };
            SaleLine {
                product_id: item.product_id.clone(),
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                unit_cost: item.unit_cost,
                pricing: pricings[i],
                track_inventory: item.track_inventory,
                line_discount: item.line_discount,
                cart_discount: shares[i],
                gross,
                net,
                tax,
            }
        })
        .collect();

    let taxable_amount: Money = lines.iter().map(|l| l.net).sum();
    let tax: Money = lines.iter().map(|l| l.tax).sum();

    Ok(SaleTotals {
        lines,
        subtotal,
        discount_amount: line_discounts + cart_discount,
        taxable_amount,
        tax,
        total: taxable_amount + tax,
    })
}

fn allocate_tax(grosses: &[Money], pricings: &[TaxMode], settings: &Settings) -> Vec<Money> {
    let mut line_tax = vec![Money::zero(); grosses.len()];

    for mode in [TaxMode::Inclusive, TaxMode::Exclusive] {
        let weights: Vec<Money> = grosses
            .iter()
            .zip(pricings)
            .map(|(g, p)| if *p == mode { *g } else { Money::zero() })
            .collect();
        let base: Money = weights.iter().sum();
        if base.is_zero() {
            continue;
        }

        let tax = match mode {
            TaxMode::Inclusive => base.split_inclusive(settings.vat_rate).1,
            TaxMode::Exclusive => base.calculate_tax(settings.vat_rate),
        };
        for (slot, share) in line_tax.iter_mut().zip(tax.allocate(&weights)) {
            *slot += share;
        }
    }

    line_tax
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, settings};
    use crate::types::TaxRate;

    #[test]
    fn test_inclusive_cart_totals() {
        let settings = settings();
        let item = CartItem::from_product(&product("p-1", "TEA-500G", 100, 60, 10), 2);

        let totals = compute_totals(&[item], &CartDiscount::None, &settings).unwrap();

        assert_eq!(totals.subtotal, Money::from_major(200));
        assert_eq!(totals.taxable_amount, Money::from_cents(17_241));
        assert_eq!(totals.tax, Money::from_cents(2_759));
        assert_eq!(totals.total, Money::from_major(200));
        assert_eq!(totals.inventory_cost(), Money::from_major(120));
    }

    #[test]
    fn test_exclusive_cart_adds_tax() {
        let mut settings = settings();
        settings.tax_mode = TaxMode::Exclusive;
        let item = CartItem::from_product(&product("p-1", "BOLT-M8", 100, 60, 10), 1);

        let totals = compute_totals(&[item], &CartDiscount::None, &settings).unwrap();

        assert_eq!(totals.taxable_amount, Money::from_major(100));
        assert_eq!(totals.tax, Money::from_major(16));
        assert_eq!(totals.total, Money::from_major(116));
    }

    #[test]
    fn test_product_pricing_overrides_store_mode() {
        let settings = settings();
        let mut p = product("p-1", "BOLT-M8", 100, 60, 10);
        p.pricing_type = Some(TaxMode::Exclusive);

        let totals = compute_totals(
            &[CartItem::from_product(&p, 1)],
            &CartDiscount::None,
            &settings,
        )
        .unwrap();
        assert_eq!(totals.total, Money::from_major(116));
    }

    #[test]
    fn test_line_then_cart_discount() {
        let settings = Settings {
            vat_rate: TaxRate::zero(),
            ..settings()
        };
        let a = CartItem::from_product(&product("a", "A", 100, 0, 10), 1)
            .with_discount(Money::from_major(20));
        let b = CartItem::from_product(&product("b", "B", 40, 0, 10), 1);

        // 80 + 40 = 120 after line discounts; 10% off = 12, split 8 / 4
        let totals = compute_totals(&[a, b], &CartDiscount::Percentage(1000), &settings).unwrap();

        assert_eq!(totals.subtotal, Money::from_major(140));
        assert_eq!(totals.discount_amount, Money::from_major(32));
        assert_eq!(totals.lines[0].cart_discount, Money::from_major(8));
        assert_eq!(totals.lines[1].cart_discount, Money::from_major(4));
        assert_eq!(totals.total, Money::from_major(108));
    }

    #[test]
    fn test_cart_discount_over_uneven_lines_keeps_lines_non_negative() {
        let settings = settings();
        let big = CartItem::from_product(&product("a", "A", 90, 0, 10), 1);
        let small = CartItem::service("Gift wrap", Money::from_cents(1));
        let tiny = CartItem::service("Bag", Money::from_cents(1));

        // Discount equal to the full cart: every line must end at exactly zero
        let totals = compute_totals(
            &[big.clone(), small.clone(), tiny.clone()],
            &CartDiscount::Amount(Money::from_cents(9_002)),
            &settings,
        )
        .unwrap();
        assert!(totals.lines.iter().all(|l| l.gross.is_zero()));
        assert!(totals.total.is_zero());

        let totals = compute_totals(
            &[small, big, tiny],
            &CartDiscount::Amount(Money::from_cents(8_999)),
            &settings,
        )
        .unwrap();
        for line in &totals.lines {
            assert!(!line.gross.is_negative(), "line {} went negative", line.name);
            assert!(!line.net.is_negative());
            assert!(!line.tax.is_negative());
        }
        assert_eq!(totals.total, Money::from_cents(3));
    }

    #[test]
    fn test_mixed_pricing_lines_sum_to_totals() {
        let settings = settings();
        let inclusive = CartItem::from_product(&product("a", "A", 33, 0, 10), 3);
        let mut exclusive = CartItem::from_product(&product("b", "B", 17, 0, 10), 1);
        exclusive.pricing = Some(TaxMode::Exclusive);

        let totals = compute_totals(
            &[inclusive, exclusive],
            &CartDiscount::Amount(Money::from_cents(999)),
            &settings,
        )
        .unwrap();

        let line_sum: Money = totals.lines.iter().map(|l| l.net + l.tax).sum();
        assert_eq!(line_sum, totals.total);
        assert_eq!(totals.taxable_amount + totals.tax, totals.total);
    }

    #[test]
    fn test_rejects_bad_carts() {
        let settings = settings();
        assert!(compute_totals(&[], &CartDiscount::None, &settings).is_err());

        let p = product("p", "P", 10, 0, 10);
        let zero_qty = CartItem::from_product(&p, 0);
        assert!(compute_totals(&[zero_qty], &CartDiscount::None, &settings).is_err());

        let over_discount =
            CartItem::from_product(&p, 1).with_discount(Money::from_major(11));
        assert!(compute_totals(&[over_discount], &CartDiscount::None, &settings).is_err());

        let item = CartItem::from_product(&p, 1);
        assert!(compute_totals(
            &[item],
            &CartDiscount::Amount(Money::from_major(11)),
            &settings
        )
        .is_err());
    }

    #[test]
    fn test_service_line_is_inclusive_and_untracked() {
        let line = CartItem::service("Layaway deposit", Money::from_major(300));
        assert_eq!(line.product_id, SERVICE_PRODUCT_ID);
        assert!(!line.track_inventory);

        let totals =
            compute_totals(&[line], &CartDiscount::None, &settings()).unwrap();
        assert_eq!(totals.total, Money::from_major(300));
        assert!(totals.inventory_cost().is_zero());
    }
}
