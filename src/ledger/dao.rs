//! The data-access seam between entity logic and the store.

use crate::error::Result;
use crate::ledger::{AccountMovement, ParticipantAccount};
use crate::store::MovementKey;

/// Data access for accounts and movements.
///
/// Entity code is written against this trait only; within an atomic
/// operation the implementation is a [`crate::ledger::CachedAccountingDao`]
/// over the store's ledger state.
pub trait AccountingDao {
    /// Fetch an account. Implementations backed by a cache create missing
    /// accounts lazily; the raw store returns
    /// [`crate::error::MarketError::NotFound`].
    fn get_account(&mut self, participant: &str) -> Result<ParticipantAccount>;

    /// Stage or persist an account.
    ///
    /// Panics if the account has an empty participant id.
    fn save_account(&mut self, account: &ParticipantAccount) -> Result<()>;

    fn get_movement(&mut self, key: &MovementKey) -> Result<AccountMovement>;

    /// Stage or persist a movement. The movement's key must be set.
    fn save_movement(&mut self, movement: &AccountMovement) -> Result<()>;

    /// Issue the next movement key for the given account's scope.
    fn new_movement_key(&mut self, participant: &str) -> Result<MovementKey>;
}

impl<D: AccountingDao + ?Sized> AccountingDao for &mut D {
    fn get_account(&mut self, participant: &str) -> Result<ParticipantAccount> {
        (**self).get_account(participant)
    }

    fn save_account(&mut self, account: &ParticipantAccount) -> Result<()> {
        (**self).save_account(account)
    }

    fn get_movement(&mut self, key: &MovementKey) -> Result<AccountMovement> {
        (**self).get_movement(key)
    }

    fn save_movement(&mut self, movement: &AccountMovement) -> Result<()> {
        (**self).save_movement(movement)
    }

    fn new_movement_key(&mut self, participant: &str) -> Result<MovementKey> {
        (**self).new_movement_key(participant)
    }
}
