//! # Settings
//!
//! Read-only store configuration handed to every service.
//!
//! ## Sources
//! Loading and merging configuration (files, UI, environment) happens
//! outside the core. The core only receives the merged value, so every
//! field has a default and `Settings::default()` is a working Kenyan
//! retail setup: 16% VAT, tax-inclusive shelf prices, loyalty off.
//!
//! ```json
//! {
//!   "vatRate": 1600,
//!   "taxMode": "inclusive",
//!   "loyalty": { "enabled": true, "spendPerPoint": 10000, "pointValue": 100 }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, TaxMode, TaxRate};
use crate::validation::validate_tax_rate_bps;

// =============================================================================
// Settings
// =============================================================================

/// Store configuration consumed by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Currency code (ISO 4217), printed on receipts.
    pub currency_code: String,

    /// VAT rate in basis points (1600 = 16%).
    pub vat_rate: TaxRate,

    /// Label printed next to the VAT amount.
    pub vat_label: String,

    /// Default pricing mode for products without their own.
    pub tax_mode: TaxMode,

    /// Free text at the bottom of receipts.
    pub receipt_footer: String,

    pub loyalty: LoyaltySettings,

    pub accounts: LedgerAccounts,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            currency_code: "KES".to_string(),
            vat_rate: TaxRate::from_bps(1600),
            vat_label: "VAT".to_string(),
            tax_mode: TaxMode::Inclusive,
            receipt_footer: "Thank you for shopping with us".to_string(),
            loyalty: LoyaltySettings::default(),
            accounts: LedgerAccounts::default(),
        }
    }
}

impl Settings {
    /// Rejects values no service can work with.
    pub fn validate(&self) -> CoreResult<()> {
        validate_tax_rate_bps(self.vat_rate.bps())?;

        if self.loyalty.enabled {
            if !self.loyalty.spend_per_point.is_positive() {
                return Err(ValidationError::MustBePositive {
                    field: "loyalty.spendPerPoint".to_string(),
                }
                .into());
            }
            if self.loyalty.point_value.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "loyalty.pointValue".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

// =============================================================================
// Loyalty
// =============================================================================

/// Loyalty program parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoyaltySettings {
    pub enabled: bool,
    /// Amount spent to earn one point (e.g. 100.00 per point).
    pub spend_per_point: Money,
    /// Value of one point when redeemed.
    pub point_value: Money,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            enabled: false,
            spend_per_point: Money::from_major(100),
            point_value: Money::from_major(1),
        }
    }
}

impl LoyaltySettings {
    /// Points earned for `spend`, rounded down.
    pub fn points_for(&self, spend: Money) -> i64 {
        if !self.enabled || !self.spend_per_point.is_positive() || !spend.is_positive() {
            return 0;
        }
        spend.cents() / self.spend_per_point.cents()
    }

    /// Currency value of `points`.
    pub fn value_of(&self, points: i64) -> Money {
        self.point_value * points
    }
}

// =============================================================================
// Ledger Accounts
// =============================================================================

/// Ids of the default ledger accounts the core posts to.
///
/// The defaults match [`crate::ledger::ChartOfAccounts::standard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerAccounts {
    pub cash: String,
    pub mobile_money: String,
    pub bank: String,
    pub inventory: String,
    pub accounts_payable: String,
    pub vat_payable: String,
    pub sales: String,
    pub cogs: String,
}

impl Default for LedgerAccounts {
    fn default() -> Self {
        LedgerAccounts {
            cash: "1000".to_string(),
            mobile_money: "1010".to_string(),
            bank: "1020".to_string(),
            inventory: "1200".to_string(),
            accounts_payable: "2000".to_string(),
            vat_payable: "2100".to_string(),
            sales: "4000".to_string(),
            cogs: "5000".to_string(),
        }
    }
}

impl LedgerAccounts {
    /// Asset account a tender settles into.
    pub fn for_payment(&self, method: PaymentMethod) -> &str {
        match method {
            PaymentMethod::Cash => &self.cash,
            PaymentMethod::MobileMoney => &self.mobile_money,
            PaymentMethod::Card | PaymentMethod::BankTransfer => &self.bank,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
