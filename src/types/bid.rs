//! Bids: standing buy/sell orders and their escrow lifecycle.
//!
//! A bid is authoritative state; while it is `Placed` a lightweight hot-zone
//! projection of it exists for matching (see the engine module). The bid
//! entity itself is updated, never deleted, and carries its final state.

use serde::{Deserialize, Serialize};

use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::ledger::{place_account_movement, AccountingDao, MovementType};
use crate::store::{BidKey, TxKey};
use crate::types::{Money, Timestamp};

/// Article identifier: an opaque name for a tradeable category of
/// computational work. Partition key for order books.
pub type ArticleId = String;

// ============================================================================
// BidType / BidState
// ============================================================================

/// Order side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BidType {
    #[default]
    Buy,
    Sell,
}

impl BidType {
    /// Canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            BidType::Buy => "BUY",
            BidType::Sell => "SELL",
        }
    }

    /// Parse the canonical string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(BidType::Buy),
            "SELL" => Ok(BidType::Sell),
            _ => Err(MarketError::validation(format!("Unknown bid type {}", s))),
        }
    }

    /// Returns the opposite side.
    pub fn opposite(self) -> Self {
        match self {
            BidType::Buy => BidType::Sell,
            BidType::Sell => BidType::Buy,
        }
    }
}

/// Lifecycle state of a bid.
///
/// Transitions only `InQueue -> Placed -> Matched`, or to `Expired` when the
/// bid is retired unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BidState {
    #[default]
    InQueue,
    Placed,
    Matched,
    Expired,
}

impl BidState {
    /// Canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            BidState::InQueue => "INQUEUE",
            BidState::Placed => "PLACED",
            BidState::Matched => "MATCHED",
            BidState::Expired => "EXPIRED",
        }
    }

    /// Parse the canonical string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "INQUEUE" => Ok(BidState::InQueue),
            "PLACED" => Ok(BidState::Placed),
            "MATCHED" => Ok(BidState::Matched),
            "EXPIRED" => Ok(BidState::Expired),
            _ => Err(MarketError::validation(format!("Unknown bid state {}", s))),
        }
    }
}

string_serde!(BidType);
string_serde!(BidState);

// ============================================================================
// Bid
// ============================================================================

/// A standing buy or sell order for an article at a limit price plus fee.
///
/// The escrowed balance of a buy bid always equals `price + fee` at placement
/// time; the escrow is released on retirement or consumed into a transaction
/// on match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_type: BidType,
    pub state: BidState,
    pub article: ArticleId,
    pub price: Money,
    pub fee: Money,
    /// Account id of the participant who submitted the order.
    pub participant: String,
    /// The signed order document the participant submitted, verbatim.
    pub document: String,
    pub signature: String,
    pub created: Timestamp,
    pub expires: Timestamp,
    /// Set when the bid is matched into a transaction.
    pub matched: Option<Timestamp>,
    pub transaction: Option<TxKey>,
}

impl Bid {
    /// Create a new bid in state `InQueue`.
    ///
    /// Validates the price against the configured minimum (which also pins
    /// the marketplace currency) and derives the fee and expiry from the
    /// configuration.
    pub fn new(
        bid_type: BidType,
        article: ArticleId,
        price: Money,
        participant: impl Into<String>,
        document: impl Into<String>,
        signature: impl Into<String>,
        now: Timestamp,
        config: &MarketConfig,
    ) -> Result<Bid> {
        if price.currency != config.min_price.currency || price.amount < config.min_price.amount {
            return Err(MarketError::validation(format!(
                "Invalid price {}, must be >= {}",
                price, config.min_price
            )));
        }

        Ok(Bid {
            bid_type,
            state: BidState::InQueue,
            article,
            price,
            fee: config.fee_for(price),
            participant: participant.into(),
            document: document.into(),
            signature: signature.into(),
            created: now,
            expires: now + config.bid_timeout_ms,
            matched: None,
            transaction: None,
        })
    }

    /// Key identifying bids that can possibly match: article plus currency.
    /// Hot zones are partitioned by this key.
    pub fn match_key(&self) -> String {
        format!("{}:{}", self.article, self.price.currency)
    }

    /// The escrow a bid puts at risk: `price + fee`.
    pub fn required_balance(&self) -> Money {
        self.price.add(self.fee)
    }

    /// Check that the participant's available balance covers `price + fee`.
    /// Applies to both sides; only the buy side will actually escrow.
    pub fn check_balance(&self, dao: &mut dyn AccountingDao) -> Result<()> {
        let required = self.required_balance();
        if required.amount < 0 {
            return Err(MarketError::validation(format!(
                "Invalid bid price (including fees) of {}",
                required
            )));
        }

        let account = dao.get_account(&self.participant)?;
        if account.available.sub(required).amount < 0 {
            return Err(MarketError::InsufficientFunds);
        }
        Ok(())
    }

    /// Escrow the bid: move `price + fee` from the participant's available to
    /// blocked balance. Sell bids book nothing: their exposure is checked,
    /// not escrowed, since settlement only releases the buyer's blocked
    /// funds.
    pub fn book(&self, dao: &mut dyn AccountingDao, key: BidKey) -> Result<()> {
        if self.bid_type == BidType::Sell {
            return Ok(());
        }

        let escrow = self.required_balance();
        let zero = Money::zero(self.price.currency);
        place_account_movement(
            dao,
            self.created,
            MovementType::Bid,
            &self.participant,
            &self.participant,
            escrow.neg(),
            escrow,
            zero,
            zero,
            Some(key),
            None,
        )
    }

    /// Retire the bid, releasing its escrow.
    ///
    /// Matched bids are left alone, the transaction governs their
    /// settlement. Already-retired bids are a no-op. Unmatched buy bids get
    /// their full escrow reimbursed.
    pub fn retire(&mut self, dao: &mut dyn AccountingDao, key: BidKey, now: Timestamp) -> Result<()> {
        if self.state != BidState::Placed && self.state != BidState::InQueue {
            // Only unmatched bids are reimbursed
            return Ok(());
        }
        if self.bid_type == BidType::Sell {
            self.state = BidState::Expired;
            return Ok(());
        }

        let escrow = self.required_balance();
        let zero = Money::zero(self.price.currency);
        place_account_movement(
            dao,
            now,
            MovementType::BidReimburse,
            &self.participant,
            &self.participant,
            escrow,
            escrow.neg(),
            zero,
            zero,
            Some(key),
            None,
        )?;

        self.state = BidState::Expired;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Money};

    fn config() -> MarketConfig {
        MarketConfig::default()
    }

    fn new_bid(bid_type: BidType, price: &str) -> Bid {
        Bid::new(
            bid_type,
            "render".to_string(),
            Money::parse(price).unwrap(),
            "addr-1",
            "doc",
            "sig",
            1_000,
            &config(),
        )
        .unwrap()
    }

    #[test]
    fn test_bid_type_roundtrip() {
        assert_eq!(BidType::parse("BUY").unwrap(), BidType::Buy);
        assert_eq!(BidType::parse("SELL").unwrap(), BidType::Sell);
        assert!(BidType::parse("HOLD").is_err());
        assert_eq!(BidType::Buy.opposite(), BidType::Sell);
    }

    #[test]
    fn test_new_bid_defaults() {
        let bid = new_bid(BidType::Buy, "mBTC 10");
        assert_eq!(bid.state, BidState::InQueue);
        assert_eq!(bid.fee, Money::parse("uBTC 300").unwrap()); // 3% of mBTC 10
        assert_eq!(bid.created, 1_000);
        assert_eq!(bid.expires, 121_000);
        assert!(bid.matched.is_none());
        assert!(bid.transaction.is_none());
    }

    #[test]
    fn test_new_bid_rejects_wrong_currency() {
        let err = Bid::new(
            BidType::Buy,
            "render".to_string(),
            Money::parse("EUR 1").unwrap(),
            "addr-1",
            "doc",
            "sig",
            0,
            &config(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_match_key_includes_currency() {
        let bid = new_bid(BidType::Buy, "mBTC 1");
        assert_eq!(bid.match_key(), "render:BTC");
    }

    #[test]
    fn test_required_balance() {
        let bid = new_bid(BidType::Buy, "mBTC 10");
        assert_eq!(bid.required_balance(), Money::parse("uBTC 10300").unwrap());
    }

    #[test]
    fn test_canonical_state_strings() {
        assert_eq!(
            serde_json::to_string(&BidState::InQueue).unwrap(),
            "\"INQUEUE\""
        );
        assert_eq!(serde_json::to_string(&BidType::Sell).unwrap(), "\"SELL\"");
        let state: BidState = serde_json::from_str("\"PLACED\"").unwrap();
        assert_eq!(state, BidState::Placed);
    }
}
