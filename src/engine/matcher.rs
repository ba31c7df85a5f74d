//! The [`Marketplace`] facade: every marketplace operation as one atomic
//! store transaction.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::MarketConfig;
use crate::engine::HotBid;
use crate::error::{MarketError, Result};
use crate::ledger::{
    place_account_movement, AccountMovement, AccountingDao, CachedAccountingDao, MovementType,
    ParticipantAccount,
};
use crate::protocol::ProtocolRules;
use crate::scheduler::{Trigger, TriggerKind};
use crate::signature::{HashSigner, SignatureService};
use crate::store::{BidKey, MemStore, TxKey};
use crate::types::{Bid, BidState, BidType, Money, Timestamp, Tmessage, Transaction};

/// The marketplace: bids in, transactions and ledger movements out.
///
/// All mutating operations run under [`MemStore::transact`], so each one is
/// all-or-nothing. Operations driven by triggers (matching, retirement) are
/// safe to invoke repeatedly; state guards turn duplicates into no-ops.
pub struct Marketplace {
    store: MemStore,
    config: MarketConfig,
    rules: ProtocolRules,
    signer: Box<dyn SignatureService>,
}

impl Marketplace {
    /// A marketplace with the development [`HashSigner`].
    pub fn new(config: MarketConfig) -> Self {
        Marketplace::with_signer(config, Box::new(HashSigner))
    }

    pub fn with_signer(config: MarketConfig, signer: Box<dyn SignatureService>) -> Self {
        Marketplace {
            store: MemStore::new(),
            config,
            rules: ProtocolRules::standard(),
            signer,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    // ========================================================================
    // Bid lifecycle
    // ========================================================================

    /// Admit a bid: check the participant's balance, escrow the stake,
    /// persist the bid and schedule its match and retirement triggers.
    ///
    /// Matching is attempted inline right after admission; a failure there
    /// doesn't fail the enqueue, the match trigger will re-drive it.
    pub fn enqueue_bid(&self, bid: Bid, now: Timestamp) -> Result<BidKey> {
        if self.config.require_valid_signature {
            self.signer
                .verify(&bid.document, &bid.participant, &bid.signature)?;
        }

        let match_key = bid.match_key();
        let key = self.store.transact(|txn| {
            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            bid.check_balance(&mut dao)?;
            let key = txn.market.insert_bid(bid.clone());
            bid.book(&mut dao, key)?;
            dao.flush()?;
            txn.market
                .schedule(Trigger::new(now, &match_key, TriggerKind::MatchBid(key)));
            txn.market.schedule(Trigger::new(
                bid.expires,
                &match_key,
                TriggerKind::RetireBid(key),
            ));
            Ok(key)
        })?;
        debug!(%key, participant = %bid.participant, "bid enqueued");

        if let Err(err) = self.try_match_bid(key, now) {
            warn!(%key, error = %err, "inline match failed, leaving it to the trigger");
        }
        Ok(key)
    }

    /// Try to match an enqueued bid against its hot zone.
    ///
    /// A bid no longer `InQueue` is a no-op (the trigger raced an earlier
    /// match). With no tradeable counterpart the bid is placed into the zone;
    /// otherwise the best-priced live counterpart is consumed and a
    /// transaction created at the resting price. Expired zone entries
    /// encountered during the scan are pruned.
    pub fn try_match_bid(&self, key: BidKey, now: Timestamp) -> Result<Option<TxKey>> {
        self.store.transact(|txn| {
            let mut bid = txn.market.get_bid(key)?;
            if bid.state != BidState::InQueue {
                debug!(%key, state = bid.state.as_str(), "bid already handled");
                return Ok(None);
            }
            let match_key = bid.match_key();

            let mut candidates: Vec<(u64, HotBid)> = txn
                .market
                .hot_bids(&match_key)
                .into_iter()
                .filter(|(_, hot)| hot.bid_type == bid.bid_type.opposite())
                .collect();
            candidates.sort_by(|(seq_a, a), (seq_b, b)| {
                a.priority(b).then(seq_a.cmp(seq_b))
            });

            let mut partner: Option<HotBid> = None;
            for (seq, hot) in candidates {
                if hot.expires <= now {
                    // lazy pruning: expired entries fall out as they're seen
                    txn.market.delete_hot_bid(&match_key, seq);
                    continue;
                }
                if hot.trades_against(bid.price) {
                    txn.market.delete_hot_bid(&match_key, seq);
                    partner = Some(hot);
                }
                // the best live entry decides either way
                break;
            }

            let hot = match partner {
                None => {
                    bid.state = BidState::Placed;
                    let entry = HotBid::new(key, &bid);
                    txn.market.insert_hot_bid(&match_key, entry);
                    txn.market.update_bid(key, bid)?;
                    return Ok(None);
                }
                Some(hot) => hot,
            };

            let mut other = txn.market.get_bid(hot.bid_key)?;
            let tx = Transaction::new(
                now,
                key,
                hot.bid_key,
                &mut bid,
                &mut other,
                self.config.tx_timeout_ms,
            )?;
            let tx_key = txn.market.insert_transaction(tx.clone());
            bid.transaction = Some(tx_key);
            other.transaction = Some(tx_key);

            let buyer_bid = if bid.bid_type == BidType::Buy { bid.clone() } else { other.clone() };
            txn.market.update_bid(key, bid)?;
            txn.market.update_bid(hot.bid_key, other)?;
            txn.market.schedule(Trigger::new(
                tx.timeout,
                &match_key,
                TriggerKind::RetireTransaction(tx_key),
            ));

            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            tx.book(&mut dao, tx_key, &buyer_bid)?;
            dao.flush()?;

            info!(%tx_key, price = %tx.price, "bids matched");
            Ok(Some(tx_key))
        })
    }

    /// Retire a bid at (or after) its expiry, releasing its escrow.
    ///
    /// Matched bids are a no-op: the transaction owns their settlement.
    /// An early invocation fails `TooYoung`, a repeat `AlreadyRetired`.
    pub fn retire_bid(&self, key: BidKey, now: Timestamp) -> Result<()> {
        self.store.transact(|txn| {
            let mut bid = txn.market.get_bid(key)?;
            match bid.state {
                BidState::Matched => {
                    debug!(%key, "not retiring a matched bid");
                    return Ok(());
                }
                BidState::Expired => return Err(MarketError::AlreadyRetired),
                BidState::InQueue | BidState::Placed => {}
            }
            if bid.expires > now {
                return Err(MarketError::TooYoung);
            }
            let match_key = bid.match_key();
            let was_placed = bid.state == BidState::Placed;

            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            bid.retire(&mut dao, key, now)?;
            dao.flush()?;
            txn.market.update_bid(key, bid)?;
            if was_placed {
                txn.market.delete_hot_bid_of(&match_key, key);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Apply a signed protocol message to a transaction.
    ///
    /// The resulting [`Tmessage`] is appended to the transaction's log
    /// whether accepted or rejected. Accepted messages advance the phase and
    /// reschedule the retirement trigger to the (possibly extended) timeout.
    pub fn send_message(
        &self,
        tx_key: TxKey,
        address: &str,
        document: &str,
        signature: &str,
        arguments: &BTreeMap<String, String>,
        now: Timestamp,
    ) -> Result<Tmessage> {
        let signature_ok = !self.config.require_valid_signature
            || self.signer.verify(document, address, signature).is_ok();

        self.store.transact(|txn| {
            let mut tx = txn.market.get_transaction(tx_key)?;
            let mut message = if signature_ok {
                self.rules
                    .send_message(&mut tx, now, address, arguments, self.signer.as_ref())
            } else {
                Tmessage {
                    received: now,
                    document: String::new(),
                    signature: String::new(),
                    from: tx.identify(address),
                    accepted: false,
                    reject_message: "Invalid signature".into(),
                    pre_phase: tx.phase,
                    post_phase: tx.phase,
                }
            };
            message.document = document.to_string();
            message.signature = signature.to_string();
            txn.market.append_message(tx_key, message.clone());

            if message.accepted {
                let match_key = tx.match_key();
                txn.market.schedule(Trigger::new(
                    tx.timeout,
                    &match_key,
                    TriggerKind::RetireTransaction(tx_key),
                ));
                txn.market.update_transaction(tx_key, tx)?;
            }
            Ok(message)
        })
    }

    /// Settle a transaction once its timeout has elapsed.
    ///
    /// `Finished` pays the seller and charges the fee; anything else refunds
    /// the buyer. Early invocations fail `TooYoung`, repeats `AlreadyRetired`
    /// (both benign for trigger executors).
    pub fn retire_transaction(&self, key: TxKey, now: Timestamp) -> Result<()> {
        self.store.transact(|txn| {
            let mut tx = txn.market.get_transaction(key)?;
            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            tx.retire(&mut dao, key, now)?;
            dao.flush()?;
            let phase = tx.phase;
            txn.market.update_transaction(key, tx)?;
            info!(%key, phase = phase.as_str(), "transaction retired");
            Ok(())
        })
    }

    // ========================================================================
    // World boundary
    // ========================================================================

    /// Credit a deposit to the participant's available balance.
    pub fn deposit(&self, participant: &str, amount: Money, now: Timestamp) -> Result<()> {
        if amount.amount <= 0 {
            return Err(MarketError::validation(format!(
                "Invalid deposit amount {}",
                amount
            )));
        }
        self.world_movement(MovementType::PayIn, participant, amount, now)
    }

    /// Pay out of the participant's available balance. Fails with
    /// `InsufficientFunds` semantics via the balance guard.
    pub fn withdraw(&self, participant: &str, amount: Money, now: Timestamp) -> Result<()> {
        if amount.amount <= 0 {
            return Err(MarketError::validation(format!(
                "Invalid withdrawal amount {}",
                amount
            )));
        }
        self.world_movement(MovementType::PayOut, participant, amount, now)
    }

    /// Record where deposits for the participant should be routed.
    pub fn set_deposit_info(&self, participant: &str, info: &str) -> Result<()> {
        self.store.transact(|txn| {
            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            let mut account = dao.get_account(participant)?;
            account.deposit_info = info.to_string();
            dao.save_account(&account)?;
            dao.flush()
        })
    }

    fn world_movement(
        &self,
        movement_type: MovementType,
        participant: &str,
        amount: Money,
        now: Timestamp,
    ) -> Result<()> {
        self.store.transact(|txn| {
            let mut dao = CachedAccountingDao::new(&mut *txn.ledger, self.config.starting_grant);
            let (available, world) = match movement_type {
                MovementType::PayIn => (amount, amount.neg()),
                MovementType::PayOut => (amount.neg(), amount),
                _ => unreachable!(),
            };
            let zero = Money::zero(amount.currency);
            place_account_movement(
                &mut dao,
                now,
                movement_type,
                participant,
                participant,
                available,
                zero,
                zero,
                world,
                None,
                None,
            )?;
            dao.flush()
        })
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Fire every due trigger. Benign failures (`AlreadyRetired`, `TooYoung`,
    /// raced keys) are swallowed; anything else is logged and dropped, on the
    /// expectation that an embedding scheduler re-drives the operation.
    /// Returns the number of triggers fired.
    pub fn run_due_triggers(&self, now: Timestamp) -> usize {
        let due = match self
            .store
            .transact(|txn| Ok(txn.market.take_due_triggers(now)))
        {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "could not drain trigger queue");
                return 0;
            }
        };

        let fired = due.len();
        for trigger in due {
            let result = match trigger.kind {
                TriggerKind::MatchBid(key) => self.try_match_bid(key, now).map(|_| ()),
                TriggerKind::RetireBid(key) => self.retire_bid(key, now),
                TriggerKind::RetireTransaction(key) => self.retire_transaction(key, now),
            };
            match result {
                Ok(()) => {}
                Err(err) if err.is_benign() => {
                    debug!(?trigger, error = %err, "trigger was a no-op");
                }
                Err(err) => {
                    warn!(?trigger, error = %err, "trigger failed");
                }
            }
        }
        fired
    }

    /// Triggers still pending, due or not.
    pub fn pending_triggers(&self) -> usize {
        self.store.read(|market, _| market.pending_triggers())
    }

    // ========================================================================
    // Read side
    // ========================================================================

    pub fn get_bid(&self, key: BidKey) -> Result<Bid> {
        self.store.read(|market, _| market.get_bid(key))
    }

    pub fn get_transaction(&self, key: TxKey) -> Result<Transaction> {
        self.store.read(|market, _| market.get_transaction(key))
    }

    /// The transaction's full message log, accepted and rejected alike.
    pub fn transaction_messages(&self, key: TxKey) -> Vec<Tmessage> {
        self.store.read(|market, _| market.messages(key))
    }

    /// The participant's account as an observer would see it: existing
    /// state, or a fresh account with the starting grant.
    pub fn account(&self, participant: &str) -> ParticipantAccount {
        self.store.read(|_, ledger| {
            ledger
                .account(participant)
                .cloned()
                .unwrap_or_else(|| {
                    ParticipantAccount::new(participant, self.config.starting_grant)
                })
        })
    }

    /// Walk the participant's movement chain backwards from the newest
    /// entry, up to `limit` movements.
    pub fn account_movements(&self, participant: &str, limit: usize) -> Vec<AccountMovement> {
        self.store.read(|_, ledger| {
            let mut out = Vec::new();
            let mut cursor = ledger
                .account(participant)
                .and_then(|account| account.last_movement_key.clone());
            while let Some(key) = cursor {
                if out.len() >= limit {
                    break;
                }
                let Some(movement) = ledger.movement(&key) else { break };
                out.push(movement.clone());
                // prefer the available-side link; when both sides are this
                // account the blocked link points at the movement itself
                cursor = if movement.available_account == participant {
                    movement.available_predecessor_key.clone()
                } else {
                    movement.blocked_predecessor_key.clone()
                };
            }
            out
        })
    }

    /// Transactions matched within `[from, to)`, in key order.
    pub fn transactions_between(&self, from: Timestamp, to: Timestamp) -> Vec<(TxKey, Transaction)> {
        self.store.read(|market, _| {
            market
                .transactions()
                .filter(|(_, tx)| tx.matched >= from && tx.matched < to)
                .map(|(key, tx)| (key, tx.clone()))
                .collect()
        })
    }

    /// Sum over every account of available plus blocked balances. With no
    /// deposits or withdrawals this equals grants minus collected fees.
    pub fn total_participant_funds(&self, currency: crate::types::Currency) -> Money {
        self.store.read(|_, ledger| {
            let mut total = Money::zero(currency);
            for account in ledger.accounts() {
                total = total.add(account.available).add(account.blocked);
            }
            total
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn market() -> Marketplace {
        Marketplace::new(MarketConfig::default())
    }

    fn bid(
        market: &Marketplace,
        bid_type: BidType,
        participant: &str,
        price: &str,
        now: Timestamp,
    ) -> Bid {
        Bid::new(
            bid_type,
            "render".to_string(),
            Money::parse(price).unwrap(),
            participant,
            "doc",
            "sig",
            now,
            market.config(),
        )
        .unwrap()
    }

    #[test]
    fn test_enqueue_places_unmatched_bid() {
        let market = market();
        let key = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 0), 0)
            .unwrap();
        let stored = market.get_bid(key).unwrap();
        assert_eq!(stored.state, BidState::Placed);
        // escrow moved from available to blocked
        let account = market.account("buyer");
        assert_eq!(account.blocked, Money::parse("uBTC 10300").unwrap());
    }

    #[test]
    fn test_match_consumes_both_bids() {
        let market = market();
        let ask = market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "mBTC 8", 0), 0)
            .unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 500), 500)
            .unwrap();

        let buy_bid = market.get_bid(buy).unwrap();
        let ask_bid = market.get_bid(ask).unwrap();
        assert_eq!(buy_bid.state, BidState::Matched);
        assert_eq!(ask_bid.state, BidState::Matched);
        assert_eq!(buy_bid.transaction, ask_bid.transaction);

        let tx = market.get_transaction(buy_bid.transaction.unwrap()).unwrap();
        assert_eq!(tx.price, Money::parse("mBTC 8").unwrap());
        // buyer escrow shrank to the transaction's price + fee
        let account = market.account("buyer");
        assert_eq!(account.blocked, tx.price.add(tx.fee));
    }

    #[test]
    fn test_no_match_across_articles() {
        let market = market();
        let mut other = bid(&market, BidType::Sell, "seller", "mBTC 8", 0);
        other.article = "transcode".to_string();
        market.enqueue_bid(other, 0).unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 0), 0)
            .unwrap();
        assert_eq!(market.get_bid(buy).unwrap().state, BidState::Placed);
    }

    #[test]
    fn test_price_priority_then_fifo() {
        let market = market();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "s1", "mBTC 9", 0), 0)
            .unwrap();
        let first_cheap = market
            .enqueue_bid(bid(&market, BidType::Sell, "s2", "mBTC 8", 10), 10)
            .unwrap();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "s3", "mBTC 8", 20), 20)
            .unwrap();

        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 100), 100)
            .unwrap();
        let tx_key = market.get_bid(buy).unwrap().transaction.unwrap();
        let tx = market.get_transaction(tx_key).unwrap();
        // cheapest ask wins; among the two equal asks, the earlier one
        assert_eq!(tx.seller_bid, first_cheap);
        assert_eq!(tx.seller, "s2");
    }

    #[test]
    fn test_insufficient_funds_rejected_atomically() {
        let market = market();
        let expensive = bid(&market, BidType::Buy, "buyer", "BTC 2", 0);
        let err = market.enqueue_bid(expensive, 0).unwrap_err();
        assert_eq!(err, MarketError::InsufficientFunds);
        // nothing escrowed, nothing scheduled
        let account = market.account("buyer");
        assert_eq!(account.blocked.amount, 0);
        assert_eq!(market.pending_triggers(), 0);
    }

    #[test]
    fn test_retire_bid_releases_escrow_once() {
        let market = market();
        let key = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 0), 0)
            .unwrap();
        market.retire_bid(key, 120_000).unwrap();
        let account = market.account("buyer");
        assert_eq!(account.blocked.amount, 0);
        assert_eq!(account.available, market.config().starting_grant);

        let err = market.retire_bid(key, 120_001).unwrap_err();
        assert_eq!(err, MarketError::AlreadyRetired);
    }

    #[test]
    fn test_retire_matched_bid_is_noop() {
        let market = market();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "mBTC 8", 0), 0)
            .unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 8", 0), 0)
            .unwrap();
        let blocked_before = market.account("buyer").blocked;
        market.retire_bid(buy, 500_000).unwrap();
        assert_eq!(market.account("buyer").blocked, blocked_before);
    }

    #[test]
    fn test_expired_resting_bid_is_pruned_not_matched() {
        let market = market();
        let ask = market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "mBTC 8", 0), 0)
            .unwrap();
        // ask expires at 120_000; the buyer arrives later
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 120_000), 120_000)
            .unwrap();
        assert_eq!(market.get_bid(buy).unwrap().state, BidState::Placed);
        assert_eq!(market.get_bid(ask).unwrap().state, BidState::Placed);
    }

    #[test]
    fn test_retire_transaction_too_young() {
        let market = market();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "mBTC 8", 0), 0)
            .unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 8", 0), 0)
            .unwrap();
        let tx_key = market.get_bid(buy).unwrap().transaction.unwrap();
        let err = market.retire_transaction(tx_key, 1_000).unwrap_err();
        assert_eq!(err, MarketError::TooYoung);
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let market = market();
        let grant = market.config().starting_grant;
        market
            .deposit("addr", Money::parse("mBTC 5").unwrap(), 0)
            .unwrap();
        assert_eq!(
            market.account("addr").available,
            grant.add(Money::parse("mBTC 5").unwrap())
        );
        market
            .withdraw("addr", Money::parse("mBTC 2").unwrap(), 10)
            .unwrap();
        assert_eq!(
            market.account("addr").available,
            grant.add(Money::parse("mBTC 3").unwrap())
        );
        // can't withdraw more than available
        assert!(market.withdraw("addr", Money::parse("BTC 50").unwrap(), 20).is_err());
    }

    #[test]
    fn test_deposit_info_sticks() {
        let market = market();
        market.set_deposit_info("addr", "btc:1BoatSLRHtKNngkdXEeobR76b53LETtpyT").unwrap();
        assert_eq!(
            market.account("addr").deposit_info,
            "btc:1BoatSLRHtKNngkdXEeobR76b53LETtpyT"
        );
        // setting it created the account with its grant
        assert_eq!(market.account("addr").available, market.config().starting_grant);
    }

    #[test]
    fn test_zero_price_transaction_retires_cleanly() {
        let market = market();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "uBTC 0", 0), 0)
            .unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 1", 0), 0)
            .unwrap();
        let tx_key = market.get_bid(buy).unwrap().transaction.unwrap();
        let tx = market.get_transaction(tx_key).unwrap();
        assert_eq!(tx.price.amount, 0);
        // the match already released the buyer's whole escrow
        assert_eq!(market.account("buyer").blocked.amount, 0);

        market.retire_transaction(tx_key, 100_000).unwrap();
        let tx = market.get_transaction(tx_key).unwrap();
        assert_eq!(tx.state, crate::types::TxState::Retired);
        assert_eq!(market.account("buyer").available, market.config().starting_grant);
    }

    #[test]
    fn test_movement_chain_walk() {
        let market = market();
        market
            .deposit("addr", Money::parse("mBTC 1").unwrap(), 0)
            .unwrap();
        market
            .deposit("addr", Money::parse("mBTC 2").unwrap(), 10)
            .unwrap();
        market
            .withdraw("addr", Money::parse("mBTC 1").unwrap(), 20)
            .unwrap();

        let movements = market.account_movements("addr", 10);
        assert_eq!(movements.len(), 3);
        // newest first
        assert_eq!(movements[0].movement_type, MovementType::PayOut);
        assert_eq!(movements[1].movement_type, MovementType::PayIn);
        assert_eq!(movements[2].movement_type, MovementType::PayIn);
        assert_eq!(movements[0].timestamp, 20);
    }

    #[test]
    fn test_run_due_triggers_expires_bids() {
        let market = market();
        let key = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 0), 0)
            .unwrap();
        assert_eq!(market.get_bid(key).unwrap().state, BidState::Placed);

        market.run_due_triggers(200_000);
        assert_eq!(market.get_bid(key).unwrap().state, BidState::Expired);
        assert_eq!(market.account("buyer").blocked.amount, 0);
    }

    #[test]
    fn test_conservation_without_world_flow() {
        let market = market();
        market
            .enqueue_bid(bid(&market, BidType::Sell, "seller", "mBTC 8", 0), 0)
            .unwrap();
        let buy = market
            .enqueue_bid(bid(&market, BidType::Buy, "buyer", "mBTC 10", 0), 0)
            .unwrap();
        let tx_key = market.get_bid(buy).unwrap().transaction.unwrap();

        // two participants, two grants, no settlement yet
        let grant = market.config().starting_grant;
        assert_eq!(
            market.total_participant_funds(Currency::Btc),
            grant.add(grant)
        );

        // timeout without any message: buyer reimbursed, still conserved
        market.retire_transaction(tx_key, 100_000).unwrap();
        assert_eq!(
            market.total_participant_funds(Currency::Btc),
            grant.add(grant)
        );
        assert_eq!(market.account("buyer").blocked.amount, 0);
    }
}
