//! Participant accounts: an available and a blocked balance.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::store::MovementKey;
use crate::types::Money;

/// A participant's account.
///
/// `available` is spendable; `blocked` is escrowed by live bids and
/// transactions. Both are non-negative at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantAccount {
    /// The participant's address. Doubles as the account id.
    pub participant: String,
    pub available: Money,
    pub blocked: Money,
    /// Newest movement touching this account; head of the backward chain.
    pub last_movement_key: Option<MovementKey>,
    /// Where deposits for this participant should be routed (a payment
    /// address or instruction blob). Opaque to the ledger.
    pub deposit_info: String,
}

impl ParticipantAccount {
    /// A fresh account funded with the starting grant.
    pub fn new(participant: impl Into<String>, grant: Money) -> Self {
        ParticipantAccount {
            participant: participant.into(),
            available: grant,
            blocked: Money::zero(grant.currency),
            last_movement_key: None,
            deposit_info: String::new(),
        }
    }

    /// Apply a delta to the available balance, rejecting overdraws.
    pub fn apply_available(&mut self, delta: Money) -> Result<()> {
        self.available = apply(self.available, delta)?;
        Ok(())
    }

    /// Apply a delta to the blocked balance, rejecting overdraws.
    pub fn apply_blocked(&mut self, delta: Money) -> Result<()> {
        self.blocked = apply(self.blocked, delta)?;
        Ok(())
    }
}

fn apply(balance: Money, delta: Money) -> Result<Money> {
    if balance.currency != delta.currency || balance.amount + delta.amount < 0 {
        return Err(MarketError::validation(format!(
            "Can't apply delta of {} to balance of {}",
            delta, balance
        )));
    }
    Ok(balance.add(delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Money};

    fn btc(amount: i64) -> Money {
        Money { amount, currency: Currency::Btc }
    }

    #[test]
    fn test_apply_rejects_overdraw() {
        let mut account = ParticipantAccount::new("addr", btc(100));
        account.apply_available(btc(-100)).unwrap();
        assert_eq!(account.available.amount, 0);
        assert!(account.apply_available(btc(-1)).is_err());
    }

    #[test]
    fn test_apply_rejects_currency_mismatch() {
        let mut account = ParticipantAccount::new("addr", btc(100));
        let eur = Money { amount: 1, currency: Currency::Eur };
        assert!(account.apply_available(eur).is_err());
    }
}
