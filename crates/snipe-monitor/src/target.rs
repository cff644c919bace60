//! Take-profit target.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snipe_core::Price;

/// Immutable take-profit target.
///
/// `target_price = base_price * (1 + percent / 100)`, computed once in
/// exact decimal arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfitTarget {
    base_price: Price,
    percent: Decimal,
    target_price: Price,
}

impl TakeProfitTarget {
    pub fn new(base_price: Price, percent: Decimal) -> Self {
        Self {
            base_price,
            percent,
            target_price: base_price.with_markup_pct(percent),
        }
    }

    pub fn base_price(&self) -> Price {
        self.base_price
    }

    pub fn percent(&self) -> Decimal {
        self.percent
    }

    pub fn target_price(&self) -> Price {
        self.target_price
    }

    /// Whether a price reading crosses the target.
    pub fn is_reached(&self, price: Price) -> bool {
        price >= self.target_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_target_price_exact() {
        let target = TakeProfitTarget::new(Price::new(dec!(2.40)), dec!(5));
        assert_eq!(target.target_price(), Price::new(dec!(2.520)));
    }

    #[test]
    fn test_is_reached_boundary() {
        let target = TakeProfitTarget::new(Price::new(dec!(1.00)), dec!(5));
        assert!(!target.is_reached(Price::new(dec!(1.0499))));
        // Equality counts as reached
        assert!(target.is_reached(Price::new(dec!(1.05))));
        assert!(target.is_reached(Price::new(dec!(1.06))));
    }
}
