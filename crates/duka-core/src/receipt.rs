//! # Receipt
//!
//! Printer-agnostic view of a finalized sale.
//!
//! Drivers for thermal printers, PDF export or SMS receipts implement
//! [`ReceiptPrinter`] outside the core and consume a [`Receipt`]; nothing
//! here knows about paper width or command bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::settings::Settings;
use crate::types::{PaymentMethod, Sale};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Discounts on the line, including its share of the cart discount.
    pub discount: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayment {
    pub label: String,
    pub amount: Money,
    pub reference: Option<String>,
}

/// Everything a printer needs for one sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_number: String,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub currency_code: String,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub taxable_amount: Money,
    /// e.g. "VAT 16%".
    pub tax_label: String,
    pub tax: Money,
    pub points_redeemed: Money,
    pub deposit_applied: Money,
    pub total: Money,
    pub payments: Vec<ReceiptPayment>,
    pub change: Money,
    pub points_earned: i64,
    pub points_balance: Option<i64>,
    pub footer: String,
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Cash",
        PaymentMethod::MobileMoney => "Mobile Money",
        PaymentMethod::Card => "Card",
        PaymentMethod::BankTransfer => "Bank Transfer",
    }
}

impl Receipt {
    pub fn from_sale(sale: &Sale, settings: &Settings) -> Self {
        Receipt {
            receipt_number: sale.receipt_number.clone(),
            issued_at: sale.created_at,
            currency_code: settings.currency_code.clone(),
            lines: sale
                .items
                .iter()
                .map(|line| ReceiptLine {
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    discount: line.line_discount + line.cart_discount,
                    amount: line.gross,
                })
                .collect(),
            subtotal: sale.subtotal,
            discount: sale.discount_amount,
            taxable_amount: sale.taxable_amount,
            tax_label: format!("{} {}%", settings.vat_label, settings.vat_rate.percentage()),
            tax: sale.tax,
            points_redeemed: sale.points_value,
            deposit_applied: sale.deposit_applied,
            total: sale.total,
            payments: sale
                .payments
                .iter()
                .map(|p| ReceiptPayment {
                    label: payment_label(p.method).to_string(),
                    amount: p.amount,
                    reference: p.reference.clone(),
                })
                .collect(),
            change: sale.change,
            points_earned: sale.points_earned,
            points_balance: sale.points_balance_after,
            footer: settings.receipt_footer.clone(),
        }
    }
}

/// Implemented by printer drivers.
pub trait ReceiptPrinter {
    /// Whatever the driver produces: bytes, a spool handle, a file path.
    type Job;
    type Error: std::error::Error;

    fn print(&self, receipt: &Receipt) -> Result<Self::Job, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartItem;
    use crate::sale::{SaleContext, SaleEngine, SaleRequest};
    use crate::test_support::{open_shift, product, settings, state_with, CASHIER};
    use crate::types::Payment;

    /// Renders plain text lines.
    struct TextPrinter;

    #[derive(Debug, thiserror::Error)]
    #[error("empty receipt")]
    struct EmptyReceipt;

    impl ReceiptPrinter for TextPrinter {
        type Job = Vec<String>;
        type Error = EmptyReceipt;

        fn print(&self, receipt: &Receipt) -> Result<Vec<String>, EmptyReceipt> {
            if receipt.lines.is_empty() {
                return Err(EmptyReceipt);
            }
            let mut out = vec![format!("Receipt {}", receipt.receipt_number)];
            for line in &receipt.lines {
                out.push(format!("{} x{} {}", line.name, line.quantity, line.amount));
            }
            out.push(format!("{} {}", receipt.tax_label, receipt.tax));
            out.push(format!("TOTAL {} {}", receipt.currency_code, receipt.total));
            out.push(receipt.footer.clone());
            Ok(out)
        }
    }

    #[test]
    fn test_receipt_from_sale() {
        let settings = settings();
        let mut state = state_with(vec![product("p-1", "MILK-500ML", 60, 45, 20)]);
        open_shift(&mut state, CASHIER, Money::zero());
        let item = CartItem::from_product(state.product("p-1").unwrap(), 3);

        let sale = SaleEngine::new(&settings)
            .complete_sale(
                &state,
                SaleRequest::new(
                    vec![item],
                    vec![Payment::cash(Money::from_major(200))],
                    SaleContext::standard(CASHIER),
                ),
            )
            .unwrap()
            .record;

        let receipt = Receipt::from_sale(&sale, &settings);
        assert_eq!(receipt.tax_label, "VAT 16%");
        assert_eq!(receipt.total, Money::from_major(180));
        assert_eq!(receipt.change, Money::from_major(20));
        assert_eq!(receipt.payments[0].label, "Cash");

        let printed = TextPrinter.print(&receipt).unwrap();
        assert_eq!(printed[1], format!("{} x3 180.00", sale.items[0].name));
        assert_eq!(printed.last().unwrap(), &settings.receipt_footer);
    }
}
