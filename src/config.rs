//! Marketplace tunables.
//!
//! Collected in one struct and passed to the components that need them, so
//! tests can run with tightened timeouts and a known starting grant.

use crate::types::{Currency, Money, Timestamp};

/// Configuration for bid admission, fees and protocol timeouts.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Fee ratio numerator: fee = ceil(price * num / den).
    pub fee_ratio_num: i64,
    /// Fee ratio denominator.
    pub fee_ratio_den: i64,
    /// How long a bid stays live before its retirement trigger fires.
    pub bid_timeout_ms: Timestamp,
    /// Initial transaction timeout, granted at match time. Phase arrivals
    /// extend it (see the protocol module).
    pub tx_timeout_ms: Timestamp,
    /// Lowest admissible bid price; also pins the marketplace currency.
    pub min_price: Money,
    /// Balance granted to an account on first access.
    pub starting_grant: Money,
    /// Whether signed documents (bids, protocol messages) are verified
    /// against the signature service. Disabled in most tests.
    pub require_valid_signature: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            // 3 percent, rounded up
            fee_ratio_num: 3,
            fee_ratio_den: 100,
            bid_timeout_ms: 120_000,
            tx_timeout_ms: 60_000,
            min_price: Money::zero(Currency::Btc),
            starting_grant: Money { amount: 100_000_000, currency: Currency::Btc }, // BTC 1
            require_valid_signature: false,
        }
    }
}

impl MarketConfig {
    /// Compute the fee for a price under this configuration (rounded up).
    pub fn fee_for(&self, price: Money) -> Money {
        Money {
            amount: (self.fee_ratio_num * price.amount + self.fee_ratio_den - 1)
                / self.fee_ratio_den,
            currency: price.currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;

    #[test]
    fn test_fee_is_three_percent_rounded_up() {
        let config = MarketConfig::default();
        let fee = |s: &str| config.fee_for(Money::parse(s).unwrap());
        assert_eq!(fee("satoshi 100"), Money::parse("satoshi 3").unwrap());
        assert_eq!(fee("satoshi 101"), Money::parse("satoshi 4").unwrap());
        assert_eq!(fee("satoshi 1"), Money::parse("satoshi 1").unwrap());
        assert_eq!(fee("satoshi 0"), Money::parse("satoshi 0").unwrap());
    }
}
