//! In-memory store: cloneable state plus a copy-and-commit executor.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use slab::Slab;
use tracing::trace;

use crate::engine::HotBid;
use crate::error::{MarketError, Result};
use crate::ledger::{AccountMovement, AccountingDao, ParticipantAccount};
use crate::scheduler::{Trigger, TriggerQueue};
use crate::store::{BidKey, MovementKey, TxKey};
use crate::types::{Bid, Timestamp, Tmessage, Transaction};

// ============================================================================
// MarketState
// ============================================================================

/// Bids, transactions, message logs, hot zones and pending triggers.
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    bids: Slab<Bid>,
    transactions: Slab<Transaction>,
    messages: HashMap<u64, Vec<Tmessage>>,
    /// Per match-key order book projection, keyed by insertion sequence.
    hot_zones: HashMap<String, BTreeMap<u64, HotBid>>,
    hot_seq: u64,
    triggers: TriggerQueue,
}

impl MarketState {
    pub fn insert_bid(&mut self, bid: Bid) -> BidKey {
        BidKey(self.bids.insert(bid) as u64)
    }

    pub fn get_bid(&self, key: BidKey) -> Result<Bid> {
        self.bids
            .get(key.0 as usize)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    pub fn update_bid(&mut self, key: BidKey, bid: Bid) -> Result<()> {
        match self.bids.get_mut(key.0 as usize) {
            Some(slot) => {
                *slot = bid;
                Ok(())
            }
            None => Err(MarketError::NotFound),
        }
    }

    pub fn insert_transaction(&mut self, tx: Transaction) -> TxKey {
        TxKey(self.transactions.insert(tx) as u64)
    }

    pub fn get_transaction(&self, key: TxKey) -> Result<Transaction> {
        self.transactions
            .get(key.0 as usize)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    pub fn update_transaction(&mut self, key: TxKey, tx: Transaction) -> Result<()> {
        match self.transactions.get_mut(key.0 as usize) {
            Some(slot) => {
                *slot = tx;
                Ok(())
            }
            None => Err(MarketError::NotFound),
        }
    }

    /// All transactions, in key order.
    pub fn transactions(&self) -> impl Iterator<Item = (TxKey, &Transaction)> {
        self.transactions.iter().map(|(k, tx)| (TxKey(k as u64), tx))
    }

    pub fn append_message(&mut self, key: TxKey, message: Tmessage) {
        self.messages.entry(key.0).or_default().push(message);
    }

    pub fn messages(&self, key: TxKey) -> Vec<Tmessage> {
        self.messages.get(&key.0).cloned().unwrap_or_default()
    }

    /// Add a bid to its hot zone; returns the insertion sequence.
    pub fn insert_hot_bid(&mut self, match_key: &str, hot: HotBid) -> u64 {
        let seq = self.hot_seq;
        self.hot_seq += 1;
        self.hot_zones
            .entry(match_key.to_string())
            .or_default()
            .insert(seq, hot);
        trace!(match_key, seq, "hot bid inserted");
        seq
    }

    /// The zone's entries in insertion order.
    pub fn hot_bids(&self, match_key: &str) -> Vec<(u64, HotBid)> {
        self.hot_zones
            .get(match_key)
            .map(|zone| zone.iter().map(|(seq, hot)| (*seq, hot.clone())).collect())
            .unwrap_or_default()
    }

    pub fn delete_hot_bid(&mut self, match_key: &str, seq: u64) {
        if let Some(zone) = self.hot_zones.get_mut(match_key) {
            zone.remove(&seq);
            if zone.is_empty() {
                self.hot_zones.remove(match_key);
            }
        }
    }

    /// Remove a bid from its zone by bid key (used when retiring a placed
    /// bid whose sequence number isn't at hand).
    pub fn delete_hot_bid_of(&mut self, match_key: &str, key: BidKey) {
        if let Some(zone) = self.hot_zones.get_mut(match_key) {
            zone.retain(|_, hot| hot.bid_key != key);
            if zone.is_empty() {
                self.hot_zones.remove(match_key);
            }
        }
    }

    pub fn schedule(&mut self, trigger: Trigger) {
        self.triggers.schedule(trigger);
    }

    pub fn take_due_triggers(&mut self, now: Timestamp) -> Vec<Trigger> {
        self.triggers.take_due(now)
    }

    pub fn pending_triggers(&self) -> usize {
        self.triggers.len()
    }
}

// ============================================================================
// LedgerState
// ============================================================================

/// Accounts and movements. This is the raw store side of the ledger; entity
/// code wraps it in a [`crate::ledger::CachedAccountingDao`].
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    accounts: HashMap<String, ParticipantAccount>,
    movements: BTreeMap<MovementKey, AccountMovement>,
    next_ids: HashMap<String, u64>,
    /// Ids reserved in batches but not yet handed out. Unused remainders are
    /// simply skipped; movement ids are monotonic, not dense.
    spares: HashMap<String, (u64, u64)>,
}

/// How many movement ids to reserve per allocation.
const ID_BATCH: u64 = 2;

impl LedgerState {
    pub fn account(&self, participant: &str) -> Option<&ParticipantAccount> {
        self.accounts.get(participant)
    }

    pub fn movement(&self, key: &MovementKey) -> Option<&AccountMovement> {
        self.movements.get(key)
    }

    /// Total movements stored, across all accounts.
    pub fn movement_count(&self) -> usize {
        self.movements.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &ParticipantAccount> {
        self.accounts.values()
    }
}

impl AccountingDao for LedgerState {
    fn get_account(&mut self, participant: &str) -> Result<ParticipantAccount> {
        self.accounts
            .get(participant)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    fn save_account(&mut self, account: &ParticipantAccount) -> Result<()> {
        assert!(
            !account.participant.is_empty(),
            "Can't save account without participant id"
        );
        self.accounts
            .insert(account.participant.clone(), account.clone());
        Ok(())
    }

    fn get_movement(&mut self, key: &MovementKey) -> Result<AccountMovement> {
        self.movements.get(key).cloned().ok_or(MarketError::NotFound)
    }

    fn save_movement(&mut self, movement: &AccountMovement) -> Result<()> {
        let key = movement
            .key
            .clone()
            .ok_or_else(|| MarketError::validation("Can't save movement without key"))?;
        self.movements.insert(key, movement.clone());
        Ok(())
    }

    fn new_movement_key(&mut self, participant: &str) -> Result<MovementKey> {
        let (low, high) = self
            .spares
            .entry(participant.to_string())
            .or_insert((0, 0));
        if low == high {
            let next = self.next_ids.entry(participant.to_string()).or_insert(1);
            *low = *next;
            *high = *next + ID_BATCH;
            *next += ID_BATCH;
        }
        let id = *low;
        *low += 1;
        Ok(MovementKey { participant: participant.to_string(), id })
    }
}

// ============================================================================
// MemStore
// ============================================================================

#[derive(Debug, Clone, Default)]
struct StoreState {
    market: MarketState,
    ledger: LedgerState,
}

/// Mutable view handed to a transaction closure. The two halves are separate
/// fields so ledger access through a dao can coexist with entity access.
pub struct StoreTxn<'a> {
    pub market: &'a mut MarketState,
    pub ledger: &'a mut LedgerState,
}

/// In-memory store with copy-and-commit transactions.
///
/// [`MemStore::transact`] clones the state, runs the closure on the clone,
/// and installs the clone only if the closure succeeds. Errors leave the
/// store byte-for-byte untouched, which is what makes partial ledger
/// application unobservable.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<StoreState>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    /// Run `f` atomically. Commits on `Ok`, discards on `Err`.
    pub fn transact<T>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| MarketError::Store("store mutex poisoned".into()))?;
        let mut working = guard.clone();
        let StoreState { market, ledger } = &mut working;
        let mut txn = StoreTxn { market, ledger };
        match f(&mut txn) {
            Ok(value) => {
                *guard = working;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Run a read-only closure against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&MarketState, &LedgerState) -> T) -> T {
        let guard = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        f(&guard.market, &guard.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::types::{Currency, Money};

    #[test]
    fn test_transact_commits_on_success() {
        let store = MemStore::new();
        store
            .transact(|txn| {
                txn.ledger
                    .save_account(&ParticipantAccount::new(
                        "a",
                        Money { amount: 5, currency: Currency::Btc },
                    ))
                    .unwrap();
                Ok(())
            })
            .unwrap();
        let amount = store.read(|_, ledger| ledger.account("a").unwrap().available.amount);
        assert_eq!(amount, 5);
    }

    #[test]
    fn test_transact_discards_on_error() {
        let store = MemStore::new();
        let result: Result<()> = store.transact(|txn| {
            txn.ledger
                .save_account(&ParticipantAccount::new(
                    "a",
                    Money { amount: 5, currency: Currency::Btc },
                ))
                .unwrap();
            Err(MarketError::validation("nope"))
        });
        assert!(result.is_err());
        assert!(store.read(|_, ledger| ledger.account("a").is_none()));
    }

    #[test]
    fn test_movement_keys_are_monotonic_per_account() {
        let mut ledger = LedgerState::default();
        let k1 = ledger.new_movement_key("a").unwrap();
        let k2 = ledger.new_movement_key("a").unwrap();
        let k3 = ledger.new_movement_key("b").unwrap();
        assert!(k2.id > k1.id);
        assert_eq!(k3.participant, "b");
        assert_eq!(k3.id, 1);
    }
}
