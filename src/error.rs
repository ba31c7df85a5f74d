//! Crate-wide error type.
//!
//! ## Error Taxonomy
//!
//! Errors fall into three classes, and callers are expected to treat them
//! differently:
//!
//! - **Validation** (`Validation`, `InsufficientFunds`): expected and routine.
//!   Nothing was mutated; the operation was rejected synchronously.
//! - **Concurrency/state** (`NotFound` on a raced key, `AlreadyRetired`,
//!   `TooYoung`): benign under concurrent operation. Callers treat these as
//!   no-ops or retry-later signals, never as failures needing attention.
//! - **Storage** (`Store`): propagated to the caller; the scheduling layer is
//!   expected to re-drive the whole logical operation later.
//!
//! Programmer errors (currency mismatch in arithmetic, saving an account with
//! no participant id) are not represented here: they panic.

use thiserror::Error;

/// Errors produced by the marketplace core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarketError {
    /// Input failed validation. No state was mutated.
    #[error("{0}")]
    Validation(String),

    /// The participant's available balance does not cover the required escrow.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Point lookup found no entity under the given key.
    #[error("No such object")]
    NotFound,

    /// The bid or transaction has already been retired; the ledger effect was
    /// not applied a second time.
    #[error("Has already been retired")]
    AlreadyRetired,

    /// A scheduled retirement fired before the timeout deadline elapsed.
    /// Retryable-later, not fatal.
    #[error("Too young to be retired")]
    TooYoung,

    /// The underlying store failed; the whole operation can be re-driven.
    #[error("Storage error: {0}")]
    Store(String),
}

impl MarketError {
    /// Shorthand for a validation error with a formatted message.
    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }

    /// True for errors that are expected under normal concurrent operation
    /// and must be treated as benign no-ops by re-driving schedulers.
    pub fn is_benign(&self) -> bool {
        matches!(self, MarketError::AlreadyRetired | MarketError::TooYoung)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MarketError>;
