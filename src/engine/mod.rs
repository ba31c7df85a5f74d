//! The marketplace engine.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same inputs and timestamps produce the same state
//! 2. **Fixed-Point Math**: no floating-point anywhere near money
//! 3. **State guards, not locks**: every settling operation checks an
//!    entity-state guard inside its atomic store transaction, so duplicate
//!    or racing invocations degrade to no-ops
//!
//! ## Matching Rules
//!
//! - Bids match only within one hot zone (article plus currency)
//! - An incoming bid takes the best-priced live opposite entry; price
//!   priority first, then FIFO among equal prices
//! - The resting bid's price wins; partial fills don't exist, a match
//!    consumes both bids entirely
//!
//! ## Example
//!
//! ```
//! use trade_kernel::config::MarketConfig;
//! use trade_kernel::engine::Marketplace;
//! use trade_kernel::types::{Bid, BidType, Money};
//!
//! let market = Marketplace::new(MarketConfig::default());
//!
//! let ask = Bid::new(
//!     BidType::Sell, "render".into(), Money::parse("mBTC 8").unwrap(),
//!     "seller", "doc", "sig", 0, market.config(),
//! ).unwrap();
//! market.enqueue_bid(ask, 0).unwrap();
//!
//! let bid = Bid::new(
//!     BidType::Buy, "render".into(), Money::parse("mBTC 10").unwrap(),
//!     "buyer", "doc", "sig", 500, market.config(),
//! ).unwrap();
//! let key = market.enqueue_bid(bid, 500).unwrap();
//!
//! // matched at the resting ask's price
//! let tx_key = market.get_bid(key).unwrap().transaction.unwrap();
//! let tx = market.get_transaction(tx_key).unwrap();
//! assert_eq!(tx.price, Money::parse("mBTC 8").unwrap());
//! ```

mod hotzone;
pub mod matcher;

pub use hotzone::HotBid;
pub use matcher::Marketplace;
