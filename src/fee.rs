//! Fee calculation utilities
//!
//! Fees are a flat percentage of the amount, expressed in percent
//! (0.5 = 0.5%), rounded to the ledger's 8 decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for ledger-currency amounts
pub const LEDGER_SCALE: u32 = 8;

/// Decimal places kept for fiat payouts
pub const FIAT_SCALE: u32 = 2;

/// Calculate a percentage fee.
///
/// # Example
/// ```
/// use custody_ledger::fee::percentage_fee;
/// use rust_decimal::Decimal;
/// // 50 USDC * 1% = 0.5 USDC
/// let fee = percentage_fee(Decimal::from(50), Decimal::ONE);
/// assert_eq!(fee, Decimal::new(5, 1));
/// ```
#[inline]
pub fn percentage_fee(amount: Decimal, percent: Decimal) -> Decimal {
    if amount <= Decimal::ZERO || percent <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Convert a net ledger amount into fiat at `rate`, rounded to cents
#[inline]
pub fn to_fiat(net_amount: Decimal, rate: Decimal) -> Decimal {
    (net_amount * rate)
        .round_dp_with_strategy(FIAT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_fee_basic() {
        assert_eq!(percentage_fee(Decimal::from(100), Decimal::ONE), Decimal::ONE);
        assert_eq!(
            percentage_fee(Decimal::from(50), Decimal::new(25, 2)),
            Decimal::new(125, 3)
        );
    }

    #[test]
    fn test_percentage_fee_zero_inputs() {
        assert_eq!(percentage_fee(Decimal::from(100), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_fee(Decimal::ZERO, Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_fee_rounds_to_ledger_scale() {
        // 0.000000015 * 50% = 0.0000000075 -> 0.00000001
        let fee = percentage_fee(Decimal::new(15, 9), Decimal::from(50));
        assert_eq!(fee, Decimal::new(1, 8));
    }

    #[test]
    fn test_to_fiat() {
        assert_eq!(to_fiat(Decimal::from(99), Decimal::ONE), Decimal::from(99));
        // 33.333 * 0.92 = 30.66636 -> 30.67
        assert_eq!(
            to_fiat(Decimal::new(33333, 3), Decimal::new(92, 2)),
            Decimal::new(3067, 2)
        );
    }
}
