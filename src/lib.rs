//! # Trade Kernel
//!
//! A marketplace core for trading units of computational work: buyers and
//! sellers post bids, matched pairs settle a trade protocol, and a
//! conservation-checked ledger escrows every satoshi along the way.
//!
//! ## Architecture
//!
//! - **Types**: Money, Bid, Transaction and the protocol message record
//! - **Ledger**: accounts, movements and the conservation rules between them
//! - **Protocol**: signed messages driving a transaction's nine-phase life
//! - **Store**: atomic copy-and-commit state with hot-zone order books
//! - **Engine**: the [`engine::Marketplace`] facade tying it all together
//! - **Scheduler**: deferred triggers for matching and retirement
//!
//! ## Design Principles
//!
//! 1. **Determinism**: identical inputs and timestamps produce identical state
//! 2. **No Floating Point**: money is an `i64` of base units, always
//! 3. **Conservation**: every ledger movement sums to zero across its
//!    available, blocked, fee and world components
//! 4. **At-most-once settlement**: state guards inside atomic store
//!    transactions, no locks beyond the store itself

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Money, Bid, Transaction, Tmessage
pub mod types;

/// Accounts, movements and the conservation rules
pub mod ledger;

/// The trade protocol rule table and message handlers
pub mod protocol;

/// Atomic in-memory store
pub mod store;

/// The marketplace engine
pub mod engine;

/// Deferred work triggers
pub mod scheduler;

/// Signature verification seam
pub mod signature;

/// Marketplace tunables
pub mod config;

/// Crate-wide error type
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::MarketConfig;
pub use engine::Marketplace;
pub use error::{MarketError, Result};
pub use types::{Bid, BidState, BidType, Currency, Money, Transaction, TxPhase};
