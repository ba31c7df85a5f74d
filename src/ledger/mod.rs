//! Account ledger: balances and the movements that change them.
//!
//! ## Conservation
//!
//! Every balance change is an [`AccountMovement`] with four components
//! that always sum to zero:
//!
//! ```text
//! available_delta + blocked_delta + fee + world == 0
//! ```
//!
//! `world` is money entering or leaving the system (deposits, withdrawals);
//! `fee` accrues to the marketplace. Each movement type constrains the sign
//! of every component, so a movement that would create or destroy money is
//! rejected before anything is written.
//!
//! ## Movement chains
//!
//! Movements are linked backwards per account: each account stores only the
//! key of its newest movement, and each movement stores the predecessor key
//! for both of the accounts it touches. Walking the chain reproduces the
//! account's full history without any index.
//!
//! ## Write path
//!
//! Entity code talks to the [`AccountingDao`] trait. Within one atomic
//! operation a [`CachedAccountingDao`] wraps the store: reads populate a
//! cache, writes stay in the cache, and a final [`CachedAccountingDao::flush`]
//! pushes everything down at once. Accounts are created lazily on first
//! access, funded with the configured starting grant.

mod account;
mod cache;
mod dao;
mod movement;

pub use account::ParticipantAccount;
pub use cache::CachedAccountingDao;
pub use dao::AccountingDao;
pub use movement::{place_account_movement, AccountMovement, MovementType};
