//! Write-back caching dao scoped to a single atomic operation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{MarketError, Result};
use crate::ledger::{AccountMovement, AccountingDao, ParticipantAccount};
use crate::store::MovementKey;
use crate::types::Money;

/// Caches reads and buffers writes on top of a delegate dao.
///
/// Within one operation the same account may be read and written several
/// times (a settlement touches the buyer twice); the cache makes every read
/// after a write observe the write, and [`CachedAccountingDao::flush`] pushes
/// the net result to the delegate exactly once per entity.
///
/// Accounts missing from the delegate are created on first access, funded
/// with the starting grant.
pub struct CachedAccountingDao<D: AccountingDao> {
    delegate: D,
    starting_grant: Money,
    accounts: HashMap<String, ParticipantAccount>,
    movements: HashMap<MovementKey, AccountMovement>,
    dirty_accounts: HashSet<String>,
    dirty_movements: HashSet<MovementKey>,
}

impl<D: AccountingDao> CachedAccountingDao<D> {
    pub fn new(delegate: D, starting_grant: Money) -> Self {
        CachedAccountingDao {
            delegate,
            starting_grant,
            accounts: HashMap::new(),
            movements: HashMap::new(),
            dirty_accounts: HashSet::new(),
            dirty_movements: HashSet::new(),
        }
    }

    /// Push every dirty entity to the delegate. Idempotent: a second flush
    /// with no writes in between pushes nothing.
    pub fn flush(&mut self) -> Result<()> {
        for participant in std::mem::take(&mut self.dirty_accounts) {
            let account = &self.accounts[&participant];
            self.delegate.save_account(account)?;
        }
        for key in std::mem::take(&mut self.dirty_movements) {
            let movement = &self.movements[&key];
            self.delegate.save_movement(movement)?;
        }
        Ok(())
    }
}

impl<D: AccountingDao> AccountingDao for CachedAccountingDao<D> {
    fn get_account(&mut self, participant: &str) -> Result<ParticipantAccount> {
        if let Some(account) = self.accounts.get(participant) {
            return Ok(account.clone());
        }
        let account = match self.delegate.get_account(participant) {
            Ok(account) => account,
            Err(MarketError::NotFound) => {
                debug!(participant, grant = %self.starting_grant, "creating account");
                self.dirty_accounts.insert(participant.to_string());
                ParticipantAccount::new(participant, self.starting_grant)
            }
            Err(err) => return Err(err),
        };
        self.accounts.insert(participant.to_string(), account.clone());
        Ok(account)
    }

    fn save_account(&mut self, account: &ParticipantAccount) -> Result<()> {
        assert!(
            !account.participant.is_empty(),
            "Can't save account without participant id"
        );
        self.dirty_accounts.insert(account.participant.clone());
        self.accounts
            .insert(account.participant.clone(), account.clone());
        Ok(())
    }

    fn get_movement(&mut self, key: &MovementKey) -> Result<AccountMovement> {
        if let Some(movement) = self.movements.get(key) {
            return Ok(movement.clone());
        }
        let movement = self.delegate.get_movement(key)?;
        self.movements.insert(key.clone(), movement.clone());
        Ok(movement)
    }

    fn save_movement(&mut self, movement: &AccountMovement) -> Result<()> {
        let key = movement
            .key
            .clone()
            .ok_or_else(|| MarketError::validation("Can't save movement without key"))?;
        self.dirty_movements.insert(key.clone());
        self.movements.insert(key, movement.clone());
        Ok(())
    }

    fn new_movement_key(&mut self, participant: &str) -> Result<MovementKey> {
        self.delegate.new_movement_key(participant)
    }
}
