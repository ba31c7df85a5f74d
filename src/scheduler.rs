//! Deferred work triggers.
//!
//! Every asynchronous follow-up in the marketplace is a trigger: match a
//! freshly enqueued bid, retire a bid at its expiry, retire a transaction at
//! its timeout. Triggers are at-least-once; the operations they drive carry
//! their own state guards, so a duplicate or early firing is a benign no-op
//! (see [`crate::error::MarketError::is_benign`]).
//!
//! Triggers are tagged with a lane derived from the hot-zone key, so an
//! executor can serialize work per order book while running different books
//! in parallel.

use serde::{Deserialize, Serialize};

use crate::store::{BidKey, TxKey};
use crate::types::Timestamp;

/// Number of serialization lanes.
pub const LANES: u32 = 64;

/// What a trigger does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    MatchBid(BidKey),
    RetireBid(BidKey),
    RetireTransaction(TxKey),
}

/// A unit of deferred work, due at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub due: Timestamp,
    pub lane: u32,
    pub kind: TriggerKind,
}

impl Trigger {
    pub fn new(due: Timestamp, match_key: &str, kind: TriggerKind) -> Self {
        Trigger { due, lane: lane_for(match_key), kind }
    }
}

/// FNV-1a over the hot-zone key, folded into a lane index.
pub fn lane_for(match_key: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for byte in match_key.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash % LANES
}

/// Pending triggers, ordered by due time with FIFO tie-break.
#[derive(Debug, Clone, Default)]
pub struct TriggerQueue {
    pending: Vec<(u64, Trigger)>,
    seq: u64,
}

impl TriggerQueue {
    pub fn schedule(&mut self, trigger: Trigger) {
        self.pending.push((self.seq, trigger));
        self.seq += 1;
    }

    /// Remove and return every trigger due at or before `now`.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<Trigger> {
        let mut due: Vec<(u64, Trigger)> = Vec::new();
        self.pending.retain(|(seq, trigger)| {
            if trigger.due <= now {
                due.push((*seq, trigger.clone()));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(seq, trigger)| (trigger.due, *seq));
        due.into_iter().map(|(_, trigger)| trigger).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_orders_by_due_then_fifo() {
        let mut queue = TriggerQueue::default();
        queue.schedule(Trigger::new(200, "a:BTC", TriggerKind::MatchBid(BidKey(1))));
        queue.schedule(Trigger::new(100, "a:BTC", TriggerKind::MatchBid(BidKey(2))));
        queue.schedule(Trigger::new(100, "a:BTC", TriggerKind::MatchBid(BidKey(3))));
        queue.schedule(Trigger::new(300, "a:BTC", TriggerKind::MatchBid(BidKey(4))));

        let due = queue.take_due(200);
        let keys: Vec<_> = due
            .iter()
            .map(|t| match t.kind {
                TriggerKind::MatchBid(k) => k.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![2, 3, 1]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_lane_is_stable_and_bounded() {
        let lane = lane_for("render:BTC");
        assert_eq!(lane, lane_for("render:BTC"));
        assert!(lane < LANES);
    }
}
