//! Transactions: the binding agreement created when two bids match.
//!
//! A transaction walks a nine-phase protocol driven by signed messages (see
//! the protocol module) and settles exactly once when retired: phase
//! `Finished` pays the seller, every other phase reimburses the buyer. The
//! `state` field (`Active`/`Retired`) is the settlement guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::ledger::{place_account_movement, AccountingDao, MovementType};
use crate::store::{BidKey, TxKey};
use crate::types::{ArticleId, Bid, BidState, BidType, Money, Timestamp};

// ============================================================================
// Thash / Treceipt
// ============================================================================

/// A 32-byte SHA-256 digest, written as 64 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thash(pub [u8; 32]);

impl Thash {
    /// Parse 64 lowercase hex digits.
    pub fn parse(s: &str) -> Result<Thash> {
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(MarketError::validation(format!("Invalid hash: {:?}", s)));
        }
        let bytes = hex::decode(s).map_err(|e| MarketError::validation(e.to_string()))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Thash(out))
    }
}

impl fmt::Display for Thash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Thash {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Thash> {
        Thash::parse(s)
    }
}

impl Serialize for Thash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Thash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Thash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Receipt for the encrypted result: its hash, signed by the buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treceipt {
    pub hash: Thash,
    pub hash_signature: String,
}

// ============================================================================
// Origin / TxState / TxPhase
// ============================================================================

/// Which party an address resolves to within a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Buyer,
    Seller,
    Unknown,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Buyer => "Buyer",
            Origin::Seller => "Seller",
            Origin::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Buyer" => Ok(Origin::Buyer),
            "Seller" => Ok(Origin::Seller),
            "Unknown" => Ok(Origin::Unknown),
            _ => Err(MarketError::validation(format!("Unknown origin {}", s))),
        }
    }
}

/// Settlement guard: a transaction settles when it leaves `Active`, and only
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxState {
    #[default]
    Active,
    Retired,
}

impl TxState {
    pub fn as_str(self) -> &'static str {
        match self {
            TxState::Active => "ACTIVE",
            TxState::Retired => "RETIRED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(TxState::Active),
            "RETIRED" => Ok(TxState::Retired),
            _ => Err(MarketError::validation(format!("Unknown state {}", s))),
        }
    }
}

/// Protocol phase of a transaction.
///
/// `Finished`, `WorkDisputed` and `ResultDisputed` are terminal; arriving in
/// one of them makes the transaction immediately eligible for retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxPhase {
    #[default]
    Establishing,
    BuyerEstablished,
    SellerEstablished,
    Transmitting,
    Working,
    Unverified,
    Finished,
    WorkDisputed,
    ResultDisputed,
}

impl TxPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TxPhase::Establishing => "ESTABLISHING",
            TxPhase::BuyerEstablished => "BUYER_ESTABLISHED",
            TxPhase::SellerEstablished => "SELLER_ESTABLISHED",
            TxPhase::Transmitting => "TRANSMITTING",
            TxPhase::Working => "WORKING",
            TxPhase::Unverified => "UNVERIFIED",
            TxPhase::Finished => "FINISHED",
            TxPhase::WorkDisputed => "WORK_DISPUTED",
            TxPhase::ResultDisputed => "RESULT_DISPUTED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ESTABLISHING" => Ok(TxPhase::Establishing),
            "BUYER_ESTABLISHED" => Ok(TxPhase::BuyerEstablished),
            "SELLER_ESTABLISHED" => Ok(TxPhase::SellerEstablished),
            "TRANSMITTING" => Ok(TxPhase::Transmitting),
            "WORKING" => Ok(TxPhase::Working),
            "UNVERIFIED" => Ok(TxPhase::Unverified),
            "FINISHED" => Ok(TxPhase::Finished),
            "WORK_DISPUTED" => Ok(TxPhase::WorkDisputed),
            "RESULT_DISPUTED" => Ok(TxPhase::ResultDisputed),
            _ => Err(MarketError::validation(format!("Unknown phase {}", s))),
        }
    }
}

string_serde!(Origin);
string_serde!(TxState);
string_serde!(TxPhase);

// ============================================================================
// Tmessage
// ============================================================================

/// Append-only record of one protocol message sent to a transaction.
///
/// Rejected messages are recorded too, with `accepted == false` and the
/// rejection reason; the log is the complete negotiation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tmessage {
    pub received: Timestamp,
    /// The signed message document, verbatim.
    pub document: String,
    pub signature: String,
    pub from: Origin,
    pub accepted: bool,
    pub reject_message: String,
    pub pre_phase: TxPhase,
    pub post_phase: TxPhase,
}

// ============================================================================
// Transaction
// ============================================================================

/// A matched pair of bids working through the trade protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Bumped on every accepted message and on retirement; lets pollers
    /// detect change cheaply.
    pub revision: u32,
    pub buyer_bid: BidKey,
    pub seller_bid: BidKey,
    pub buyer: String,
    pub seller: String,
    pub article: ArticleId,
    /// Agreed price: the resting (elder) bid's limit price.
    pub price: Money,
    /// Fee charged on settlement: the smaller of the two bids' fees.
    pub fee: Money,
    pub matched: Timestamp,
    pub state: TxState,
    pub phase: TxPhase,
    /// Deadline after which the transaction may be retired. Extended by
    /// phase-arrival grants.
    pub timeout: Timestamp,
    pub worker_url: Option<String>,
    pub work_hash: Option<Thash>,
    pub work_secret_hash: Option<Thash>,
    pub buyer_secret: Option<Thash>,
    pub encrypted_result_receipt: Option<Treceipt>,
    pub result_decryption_key: Option<Thash>,
}

impl Transaction {
    /// Match an incoming bid against a resting one.
    ///
    /// The incoming (`new`) bid must still be `InQueue`, the resting (`old`)
    /// bid `Placed`, the sides opposite, and neither expired. The resting
    /// bid's price wins; the fee is the smaller of the two. Both bids are
    /// marked `Matched`.
    pub fn new(
        now: Timestamp,
        new_key: BidKey,
        old_key: BidKey,
        new_bid: &mut Bid,
        old_bid: &mut Bid,
        tx_timeout_ms: Timestamp,
    ) -> Result<Transaction> {
        if new_bid.bid_type != old_bid.bid_type.opposite() {
            return Err(MarketError::validation("Bids are on the same side"));
        }
        if new_bid.article != old_bid.article {
            return Err(MarketError::validation("Article mismatch"));
        }
        if new_bid.price.currency != old_bid.price.currency {
            return Err(MarketError::validation("Currency mismatch"));
        }
        if new_bid.state != BidState::InQueue {
            return Err(MarketError::validation(format!(
                "New bid in state {}, expected INQUEUE",
                new_bid.state.as_str()
            )));
        }
        if old_bid.state != BidState::Placed {
            return Err(MarketError::validation(format!(
                "Old bid in state {}, expected PLACED",
                old_bid.state.as_str()
            )));
        }
        if new_bid.expires <= now || old_bid.expires <= now {
            return Err(MarketError::validation("Bid expired"));
        }

        let (buyer_bid, seller_bid, buyer, seller) = if new_bid.bid_type == BidType::Buy {
            (new_key, old_key, &new_bid.participant, &old_bid.participant)
        } else {
            (old_key, new_key, &old_bid.participant, &new_bid.participant)
        };

        new_bid.state = BidState::Matched;
        new_bid.matched = Some(now);
        old_bid.state = BidState::Matched;
        old_bid.matched = Some(now);

        Ok(Transaction {
            revision: 0,
            buyer_bid,
            seller_bid,
            buyer: buyer.clone(),
            seller: seller.clone(),
            article: old_bid.article.clone(),
            price: old_bid.price,
            fee: old_bid.fee.min(new_bid.fee),
            matched: now,
            state: TxState::Active,
            phase: TxPhase::Establishing,
            timeout: now + tx_timeout_ms,
            worker_url: None,
            work_hash: None,
            work_secret_hash: None,
            buyer_secret: None,
            encrypted_result_receipt: None,
            result_decryption_key: None,
        })
    }

    /// Hot-zone key this transaction came out of.
    pub fn match_key(&self) -> String {
        format!("{}:{}", self.article, self.price.currency)
    }

    /// Resolve an address to its role within this transaction.
    pub fn identify(&self, address: &str) -> Origin {
        if address == self.buyer {
            Origin::Buyer
        } else if address == self.seller {
            Origin::Seller
        } else {
            Origin::Unknown
        }
    }

    /// Refund the buyer the difference between what their bid escrowed and
    /// what this transaction actually binds.
    ///
    /// The agreed price can only be at or below the buyer's limit, so the
    /// delta is non-negative; a negative delta means corrupted state. A zero
    /// delta books nothing.
    pub fn book(
        &self,
        dao: &mut dyn AccountingDao,
        tx_key: TxKey,
        buyer_bid: &Bid,
    ) -> Result<()> {
        let delta = buyer_bid
            .price
            .add(buyer_bid.fee)
            .sub(self.price.add(self.fee));
        if delta.amount < 0 {
            return Err(MarketError::validation(format!(
                "Strange price delta: {}",
                delta
            )));
        }
        if delta.amount == 0 {
            return Ok(());
        }

        let zero = Money::zero(self.price.currency);
        place_account_movement(
            dao,
            self.matched,
            MovementType::Transaction,
            &self.buyer,
            &self.buyer,
            delta,
            delta.neg(),
            zero,
            zero,
            None,
            Some(tx_key),
        )
    }

    /// Settle the transaction.
    ///
    /// Errors with `AlreadyRetired` if it has settled before, `TooYoung` if
    /// the timeout hasn't elapsed. In phase `Finished` the seller is paid
    /// `price` out of the buyer's escrow and `fee` goes to the fee account;
    /// in every other phase the buyer is reimbursed in full. A zero-price
    /// match escrowed nothing, so it books no movement at all.
    pub fn retire(&mut self, dao: &mut dyn AccountingDao, tx_key: TxKey, now: Timestamp) -> Result<()> {
        assert_eq!(
            self.price.currency, self.fee.currency,
            "Currencies don't match in transaction {}",
            tx_key
        );
        if self.state != TxState::Active {
            return Err(MarketError::AlreadyRetired);
        }
        if self.timeout > now {
            return Err(MarketError::TooYoung);
        }

        let escrow = self.price.add(self.fee);
        let zero = Money::zero(self.price.currency);
        if escrow.is_zero() {
            // nothing was bound, nothing to move
        } else if self.phase == TxPhase::Finished {
            place_account_movement(
                dao,
                now,
                MovementType::TransactionFinish,
                &self.seller,
                &self.buyer,
                self.price,
                escrow.neg(),
                self.fee,
                zero,
                None,
                Some(tx_key),
            )?;
        } else {
            place_account_movement(
                dao,
                now,
                MovementType::TransactionReimburse,
                &self.buyer,
                &self.buyer,
                escrow,
                escrow.neg(),
                zero,
                zero,
                None,
                Some(tx_key),
            )?;
        }

        self.state = TxState::Retired;
        self.revision += 1;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
