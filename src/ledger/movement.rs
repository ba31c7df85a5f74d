//! Account movements and the conservation rules they must obey.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::ledger::AccountingDao;
use crate::store::{BidKey, MovementKey, TxKey};
use crate::types::{string_serde, Money, Timestamp};

// ============================================================================
// MovementType
// ============================================================================

/// What kind of event a movement records. Each type fixes the permitted sign
/// of every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementType {
    /// Escrow for a placed buy bid: available down, blocked up.
    Bid,
    /// Escrow release for an unmatched bid.
    BidReimburse,
    /// Partial refund when a transaction binds less than the bid escrowed.
    Transaction,
    /// Settlement in the seller's favor; the fee component is charged here.
    TransactionFinish,
    /// Settlement refunding the buyer in full.
    TransactionReimburse,
    /// Deposit: money enters from the world.
    PayIn,
    /// Withdrawal: money leaves to the world.
    PayOut,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Bid => "BID",
            MovementType::BidReimburse => "BID_REIMBURSE",
            MovementType::Transaction => "TRANSACTION",
            MovementType::TransactionFinish => "TRANSACTION_FINISH",
            MovementType::TransactionReimburse => "TRANSACTION_REIMBURSE",
            MovementType::PayIn => "PAYIN",
            MovementType::PayOut => "PAYOUT",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "BID" => Ok(MovementType::Bid),
            "BID_REIMBURSE" => Ok(MovementType::BidReimburse),
            "TRANSACTION" => Ok(MovementType::Transaction),
            "TRANSACTION_FINISH" => Ok(MovementType::TransactionFinish),
            "TRANSACTION_REIMBURSE" => Ok(MovementType::TransactionReimburse),
            "PAYIN" => Ok(MovementType::PayIn),
            "PAYOUT" => Ok(MovementType::PayOut),
            _ => Err(MarketError::validation(format!(
                "Unknown movement type {}",
                s
            ))),
        }
    }

    /// Sign constraints as (available, blocked, fee, world).
    ///
    /// Codes: -2 strictly negative, -1 non-positive, 0 zero, 1 non-negative,
    /// 2 strictly positive.
    fn directions(self) -> (i8, i8, i8, i8) {
        match self {
            MovementType::Bid => (-2, 2, 0, 0),
            MovementType::BidReimburse => (2, -2, 0, 0),
            MovementType::Transaction => (1, -1, 0, 0),
            MovementType::TransactionFinish => (2, -2, 1, 0),
            MovementType::TransactionReimburse => (2, -2, 0, 0),
            MovementType::PayIn => (2, 0, 0, -2),
            MovementType::PayOut => (-2, 0, 0, 2),
        }
    }
}

string_serde!(MovementType);

// ============================================================================
// AccountMovement
// ============================================================================

/// One ledger entry. Immutable once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMovement {
    /// Assigned just before saving; `None` while under construction.
    pub key: Option<MovementKey>,
    pub timestamp: Timestamp,
    pub movement_type: MovementType,

    pub available_delta: Money,
    pub available_account: String,
    pub available_predecessor_key: Option<MovementKey>,

    pub blocked_delta: Money,
    pub blocked_account: String,
    pub blocked_predecessor_key: Option<MovementKey>,

    pub fee: Money,
    pub world: Money,

    pub bid_key: Option<BidKey>,
    pub tx_key: Option<TxKey>,
}

impl AccountMovement {
    /// Check conservation and the sign constraints of the movement type.
    pub fn validate(&self) -> Result<()> {
        let currency = self.available_delta.currency;
        for part in [&self.blocked_delta, &self.fee, &self.world] {
            if part.currency != currency {
                return Err(MarketError::validation(format!(
                    "Mixed currencies in movement: {}",
                    self
                )));
            }
        }

        let sum = self.available_delta.amount
            + self.blocked_delta.amount
            + self.fee.amount
            + self.world.amount;
        if sum != 0 {
            return Err(MarketError::validation(format!(
                "Doesn't sum up to zero: {}",
                self
            )));
        }

        let (available, blocked, fee, world) = self.movement_type.directions();
        check_flow_direction("available", available, self.available_delta.amount)?;
        check_flow_direction("blocked", blocked, self.blocked_delta.amount)?;
        check_flow_direction("fee", fee, self.fee.amount)?;
        check_flow_direction("world", world, self.world.amount)?;
        Ok(())
    }
}

fn check_flow_direction(field: &str, direction: i8, amount: i64) -> Result<()> {
    let ok = match direction {
        -2 => amount < 0,
        -1 => amount <= 0,
        0 => amount == 0,
        1 => amount >= 0,
        2 => amount > 0,
        _ => unreachable!(),
    };
    if ok {
        Ok(())
    } else {
        let relation = ["<", "<=", "=", ">=", ">"][(direction + 2) as usize];
        Err(MarketError::validation(format!(
            "Cash flow direction violated: {} amount of {} must be {} 0",
            field, amount, relation
        )))
    }
}

impl fmt::Display for AccountMovement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}: available {} -> {} / blocked {} -> {} / fee {} / world {}]",
            self.movement_type.as_str(),
            self.available_delta,
            self.available_account,
            self.blocked_delta,
            self.blocked_account,
            self.fee,
            self.world
        )
    }
}

// ============================================================================
// place_account_movement
// ============================================================================

/// Build, validate and persist a movement, updating both affected accounts
/// and their chains.
///
/// The available side is applied first. When both sides name the same
/// participant, the blocked step reads the account back through the dao and
/// therefore observes the available step's writes.
#[allow(clippy::too_many_arguments)]
pub fn place_account_movement(
    dao: &mut dyn AccountingDao,
    now: Timestamp,
    movement_type: MovementType,
    available_participant: &str,
    blocked_participant: &str,
    available_delta: Money,
    blocked_delta: Money,
    fee: Money,
    world: Money,
    bid_key: Option<BidKey>,
    tx_key: Option<TxKey>,
) -> Result<()> {
    let mut movement = AccountMovement {
        key: None,
        timestamp: now,
        movement_type,
        available_delta,
        available_account: available_participant.to_string(),
        available_predecessor_key: None,
        blocked_delta,
        blocked_account: blocked_participant.to_string(),
        blocked_predecessor_key: None,
        fee,
        world,
        bid_key,
        tx_key,
    };
    movement.validate()?;

    let key = dao.new_movement_key(available_participant)?;

    let mut account = dao.get_account(available_participant)?;
    account.apply_available(available_delta)?;
    movement.available_predecessor_key = account.last_movement_key.take();
    account.last_movement_key = Some(key.clone());
    dao.save_account(&account)?;

    let mut account = dao.get_account(blocked_participant)?;
    account.apply_blocked(blocked_delta)?;
    movement.blocked_predecessor_key = account.last_movement_key.take();
    account.last_movement_key = Some(key.clone());
    dao.save_account(&account)?;

    movement.key = Some(key);
    debug!(movement = %movement, "placing account movement");
    dao.save_movement(&movement)
}
