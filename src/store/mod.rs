//! Abstract transactional store and its in-memory implementation.
//!
//! ## Contract
//!
//! The marketplace core needs only a narrow store contract (everything else
//! about persistence is out of scope):
//!
//! - point lookup / insert / update by opaque key
//! - delete (hot-zone entries only; bids and transactions are never deleted)
//! - batch reservation of monotonic id ranges per account (movement keys)
//! - ordered, partition-scoped scans of the hot zone
//! - an atomic transaction executor spanning every entity an operation
//!   touches; a single match touches two bids, their accounts, the hot zone
//!   and a new transaction
//!
//! ## Atomicity
//!
//! [`MemStore::transact`] runs the closure against a copy of the state and
//! installs the copy only on success, so a failed operation leaves nothing
//! behind. This is the property every engine operation leans on: partial
//! ledger application is never observable.

mod memory;

pub use memory::{LedgerState, MarketState, MemStore, StoreTxn};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque store-assigned key of a [`crate::types::Bid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BidKey(pub u64);

/// Opaque store-assigned key of a [`crate::types::Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxKey(pub u64);

/// Key of an account movement: monotonically issued per account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MovementKey {
    /// The account the id was issued under.
    pub participant: String,
    /// Monotonic id within the account's scope.
    pub id: u64,
}

impl fmt::Display for BidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bid:{}", self.0)
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

impl fmt::Display for MovementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.participant, self.id)
    }
}
