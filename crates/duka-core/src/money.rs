//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                     │
//! │                                                                         │
//! │  A journal entry that is "balanced within 0.01" in floating point can  │
//! │  drift after thousands of postings.                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is an i64 count of the smallest currency unit.         │
//! │    Debits == credits is then an exact comparison.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::money::Money;
//!
//! let price = Money::from_cents(10_000); // KSh 100.00
//! let line = price * 2;
//! assert_eq!(line.cents(), 20_000);
//! assert_eq!(line.to_string(), "200.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Basis points in one whole (100%).
const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values appear in reversals and variances
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No float constructor**: amounts enter the system as cents only
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► CartItem.unit_price ──► SaleLine.gross ──► Sale.total
///                                                                 │
///              Payment.amount ◄───────────────────────────────────┤
///                                                                 ▼
///                                              JournalLine.debit / credit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(1000).cents(), 100_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns `self` if positive, otherwise zero.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 > 0 {
            Money(self.0)
        } else {
            Money(0)
        }
    }

    /// Tax on top of a tax-exclusive amount.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    /// use duka_core::types::TaxRate;
    ///
    /// let net = Money::from_cents(10_000);
    /// assert_eq!(net.calculate_tax(TaxRate::from_bps(1600)).cents(), 1600);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(div_round(self.0 as i128 * rate.bps() as i128, BPS_SCALE))
    }

    /// Splits a tax-inclusive amount into `(net, tax)`.
    ///
    /// The tax is derived as `gross - net`, so the two parts always add
    /// back to the original amount to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    /// use duka_core::types::TaxRate;
    ///
    /// let (net, tax) = Money::from_cents(20_000).split_inclusive(TaxRate::from_bps(1600));
    /// assert_eq!(net.cents(), 17_241);
    /// assert_eq!(tax.cents(), 2_759);
    /// ```
    pub fn split_inclusive(&self, rate: TaxRate) -> (Money, Money) {
        let net = div_round(
            self.0 as i128 * BPS_SCALE,
            BPS_SCALE + rate.bps() as i128,
        );
        (Money(net), Money(self.0 - net))
    }

    /// Returns `bps` basis points of this amount.
    pub fn percentage(&self, bps: u32) -> Money {
        Money(div_round(self.0 as i128 * bps as i128, BPS_SCALE))
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Divides this amount into shares proportional to `weights`.
    ///
    /// Largest-remainder apportionment: every share is rounded down, then
    /// the leftover cents go one each to the largest fractional parts (ties
    /// to the earlier weight). Shares always sum to `self`, and when
    /// `|self| <= Σweights` no share exceeds its own weight. Negative
    /// weights count as zero. All-zero weights put the whole amount on the
    /// last slot.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let shares = Money::from_cents(100).allocate(&[
    ///     Money::from_cents(1),
    ///     Money::from_cents(1),
    ///     Money::from_cents(1),
    /// ]);
    /// assert_eq!(shares, vec![Money::from_cents(34), Money::from_cents(33), Money::from_cents(33)]);
    /// ```
    pub fn allocate(&self, weights: &[Money]) -> Vec<Money> {
        if weights.is_empty() {
            return Vec::new();
        }

        let total_weight: i128 = weights.iter().map(|w| w.0.max(0) as i128).sum();
        if total_weight == 0 {
            let mut shares = vec![Money::zero(); weights.len()];
            shares[weights.len() - 1] = *self;
            return shares;
        }

        let amount = self.0.unsigned_abs() as i128;
        let mut shares: Vec<i128> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(i128, usize)> = Vec::with_capacity(weights.len());
        for (i, w) in weights.iter().enumerate() {
            let exact = amount * w.0.max(0) as i128;
            shares.push(exact / total_weight);
            remainders.push((exact % total_weight, i));
        }

        let leftover = amount - shares.iter().sum::<i128>();
        remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for &(_, i) in remainders.iter().take(leftover as usize) {
            shares[i] += 1;
        }

        let sign = if self.0 < 0 { -1 } else { 1 };
        shares
            .into_iter()
            .map(|s| Money(sign * s as i64))
            .collect()
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i64 {
    let half = denominator / 2;
    let rounded = if (numerator >= 0) == (denominator >= 0) {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `1234.56` rendering; currency symbols are a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_and_parts() {
        let money = Money::from_major(1000) + Money::from_cents(99);
        assert_eq!(money.cents(), 100_099);
        assert_eq!(money.major(), 1000);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_exclusive_tax_rounds_half_up() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_split_inclusive_vat() {
        // 2 × 100.00 tax-inclusive at 16%
        let (net, tax) = Money::from_cents(20_000).split_inclusive(TaxRate::from_bps(1600));
        assert_eq!(net.cents(), 17_241);
        assert_eq!(tax.cents(), 2_759);
        assert_eq!((net + tax).cents(), 20_000);
    }

    #[test]
    fn test_split_inclusive_zero_rate() {
        let (net, tax) = Money::from_cents(999).split_inclusive(TaxRate::zero());
        assert_eq!(net.cents(), 999);
        assert!(tax.is_zero());
    }

    #[test]
    fn test_allocate_preserves_total() {
        let weights = [
            Money::from_cents(30_000),
            Money::from_cents(10_000),
            Money::from_cents(5_000),
        ];
        let shares = Money::from_cents(1_001).allocate(&weights);
        let total: Money = shares.iter().sum();
        assert_eq!(total.cents(), 1_001);
        assert_eq!(shares[0].cents(), 667);
        assert_eq!(shares[1].cents(), 223);
        assert_eq!(shares[2].cents(), 111);
    }

    #[test]
    fn test_allocate_never_exceeds_weight() {
        // 3, 3, 1 cents sharing 6: floors are 2, 2, 0 and the leftover
        // cents go to the largest remainders, not all to the last line.
        let weights = [Money::from_cents(3), Money::from_cents(3), Money::from_cents(1)];
        let shares = Money::from_cents(6).allocate(&weights);
        assert_eq!(
            shares,
            vec![Money::from_cents(3), Money::from_cents(2), Money::from_cents(1)]
        );
        for (share, weight) in shares.iter().zip(&weights) {
            assert!(share <= weight);
        }

        let negative = Money::from_cents(-6).allocate(&weights);
        assert_eq!(negative.iter().sum::<Money>(), Money::from_cents(-6));
    }

    #[test]
    fn test_allocate_skips_trailing_zero_weight() {
        let shares =
            Money::from_cents(10).allocate(&[Money::from_cents(3), Money::zero()]);
        assert_eq!(shares, vec![Money::from_cents(10), Money::zero()]);
    }

    #[test]
    fn test_clamp_and_sign() {
        assert_eq!(Money::from_cents(-5).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(5).clamp_non_negative().cents(), 5);
        assert!((-Money::from_cents(5)).is_negative());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(Money::from_cents(10_000).percentage(1000).cents(), 1_000);
        assert_eq!(Money::from_cents(333).percentage(5000).cents(), 167);
    }
}
