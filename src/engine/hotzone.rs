//! Hot-zone entries: the lightweight matching projection of placed bids.

use std::cmp::Ordering;

use crate::store::BidKey;
use crate::types::{Bid, BidType, Money, Timestamp};

/// What the matcher needs to know about a placed bid.
///
/// Everything else stays on the bid entity; a zone scan touches only these.
#[derive(Debug, Clone, PartialEq)]
pub struct HotBid {
    pub bid_key: BidKey,
    pub bid_type: BidType,
    pub price: Money,
    pub expires: Timestamp,
}

impl HotBid {
    pub fn new(key: BidKey, bid: &Bid) -> Self {
        HotBid {
            bid_key: key,
            bid_type: bid.bid_type,
            price: bid.price,
            expires: bid.expires,
        }
    }

    /// True if this entry's price would still trade against `limit` on the
    /// opposite side.
    pub fn trades_against(&self, limit: Money) -> bool {
        match self.bid_type {
            // a resting sell trades when its ask is at or under the limit
            BidType::Sell => self.price.amount <= limit.amount,
            // a resting buy trades when its limit is at or over the ask
            BidType::Buy => self.price.amount >= limit.amount,
        }
    }

    /// Price priority among entries of the same side: cheapest ask first,
    /// highest buy limit first. Ties are broken by insertion sequence
    /// outside this function.
    pub fn priority(&self, other: &HotBid) -> Ordering {
        match self.bid_type {
            BidType::Sell => self.price.amount.cmp(&other.price.amount),
            BidType::Buy => other.price.amount.cmp(&self.price.amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Money};

    fn hot(bid_type: BidType, amount: i64) -> HotBid {
        HotBid {
            bid_key: BidKey(0),
            bid_type,
            price: Money { amount, currency: Currency::Btc },
            expires: 1_000,
        }
    }

    #[test]
    fn test_trades_against() {
        assert!(hot(BidType::Sell, 80).trades_against(hot(BidType::Buy, 100).price));
        assert!(!hot(BidType::Sell, 120).trades_against(hot(BidType::Buy, 100).price));
        assert!(hot(BidType::Buy, 100).trades_against(hot(BidType::Sell, 100).price));
    }

    #[test]
    fn test_priority() {
        // cheapest sell wins
        assert_eq!(hot(BidType::Sell, 80).priority(&hot(BidType::Sell, 90)), Ordering::Less);
        // highest buy wins
        assert_eq!(hot(BidType::Buy, 90).priority(&hot(BidType::Buy, 80)), Ordering::Less);
    }
}
