//! The trade protocol: signed messages driving a transaction's phase.
//!
//! ## Rule matching
//!
//! A message is a set of named arguments. It matches a rule only if it comes
//! from the right party and its argument names are exactly the rule's
//! argument set (no missing, no extra). The rule then lists the permitted
//! phase transitions; the transaction's current phase must be a `from` phase
//! of one of them.
//!
//! ## Atomicity
//!
//! Handlers run against a scratch copy of the transaction. A message either
//! applies completely (fields set, phase advanced, revision bumped, timeout
//! grant added) or leaves the transaction untouched and is recorded as
//! rejected.
//!
//! ## Timeout grants
//!
//! Arriving in a phase buys time: `Transmitting` +2min, `Working` +5min,
//! `Unverified` +15min. Arriving in a terminal phase pulls the timeout to
//! now, making the transaction immediately retirable.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::signature::SignatureService;
use crate::types::{Origin, Thash, Timestamp, Tmessage, Transaction, Treceipt, TxPhase, TxState};

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    WorkHashes,
    WorkerUrl,
    BuyerSecret,
    RejectWork,
    TransmitFinished,
    RejectResult,
    AcceptResult,
}

struct Rule {
    from: Origin,
    kind: MessageKind,
    arguments: &'static [&'static str],
    transitions: &'static [(TxPhase, TxPhase)],
}

impl Rule {
    fn matches(&self, from_buyer: bool, arguments: &BTreeMap<String, String>) -> bool {
        let role_ok = match self.from {
            Origin::Buyer => from_buyer,
            Origin::Seller => !from_buyer,
            Origin::Unknown => false,
        };
        role_ok
            && arguments.len() == self.arguments.len()
            && self.arguments.iter().all(|name| arguments.contains_key(*name))
    }
}

/// The protocol's rule table.
pub struct ProtocolRules {
    rules: Vec<Rule>,
}

impl ProtocolRules {
    /// The standard trade protocol.
    pub fn standard() -> Self {
        use MessageKind::*;
        use Origin::{Buyer, Seller};
        use TxPhase::*;
        ProtocolRules {
            rules: vec![
                Rule {
                    from: Buyer,
                    kind: WorkHashes,
                    arguments: &["workhash", "worksecrethash"],
                    transitions: &[
                        (Establishing, BuyerEstablished),
                        (SellerEstablished, Transmitting),
                    ],
                },
                Rule {
                    from: Seller,
                    kind: WorkerUrl,
                    arguments: &["workerurl"],
                    transitions: &[
                        (Establishing, SellerEstablished),
                        (BuyerEstablished, Transmitting),
                    ],
                },
                Rule {
                    from: Seller,
                    kind: BuyerSecret,
                    arguments: &["buyersecret"],
                    transitions: &[
                        (BuyerEstablished, Working),
                        (Transmitting, Working),
                    ],
                },
                Rule {
                    from: Seller,
                    kind: RejectWork,
                    arguments: &["rejectwork"],
                    transitions: &[
                        (SellerEstablished, WorkDisputed),
                        (Transmitting, WorkDisputed),
                    ],
                },
                Rule {
                    from: Seller,
                    kind: TransmitFinished,
                    arguments: &["encresulthash", "encresulthashsig", "encresultkey"],
                    transitions: &[(Working, Unverified)],
                },
                // A rejected result disputes the work, not the result: the
                // buyer never received the decryption key, so from their
                // point of view no result exists yet.
                Rule {
                    from: Buyer,
                    kind: RejectResult,
                    arguments: &["rejectresult"],
                    transitions: &[(Unverified, WorkDisputed)],
                },
                Rule {
                    from: Buyer,
                    kind: AcceptResult,
                    arguments: &["acceptresult"],
                    transitions: &[
                        (Establishing, Finished),
                        (BuyerEstablished, Finished),
                        (SellerEstablished, Finished),
                        (Transmitting, Finished),
                        (Working, Finished),
                        (Unverified, Finished),
                    ],
                },
            ],
        }
    }

    /// Apply a message to a transaction.
    ///
    /// Always returns a [`Tmessage`] for the audit log; `accepted` says
    /// whether the transaction changed. The transaction is only mutated on
    /// acceptance.
    pub fn send_message(
        &self,
        tx: &mut Transaction,
        now: Timestamp,
        address: &str,
        arguments: &BTreeMap<String, String>,
        verifier: &dyn SignatureService,
    ) -> Tmessage {
        let mut message = Tmessage {
            received: now,
            document: String::new(),
            signature: String::new(),
            from: tx.identify(address),
            accepted: false,
            reject_message: String::new(),
            pre_phase: tx.phase,
            post_phase: tx.phase,
        };

        if tx.state != TxState::Active || tx.timeout <= now {
            message.reject_message = "Transaction no longer active".into();
            return message;
        }
        if message.from == Origin::Unknown {
            message.reject_message = "Unknown sender".into();
            return message;
        }

        let from_buyer = message.from == Origin::Buyer;
        let rule = match self.rules.iter().find(|r| r.matches(from_buyer, arguments)) {
            Some(rule) => rule,
            None => {
                message.reject_message = "Invalid message type".into();
                return message;
            }
        };

        let transition = match rule.transitions.iter().find(|(pre, _)| *pre == tx.phase) {
            Some(transition) => transition,
            None => {
                message.reject_message = "Invalid transaction phase".into();
                return message;
            }
        };
        message.post_phase = transition.1;

        let mut scratch = tx.clone();
        if let Err(err) = apply(rule.kind, &mut scratch, arguments, verifier) {
            message.reject_message = err.to_string();
            return message;
        }

        scratch.phase = transition.1;
        scratch.revision += 1;
        if transition.1 != transition.0 {
            match transition.1 {
                TxPhase::Transmitting => scratch.timeout += 120_000,
                TxPhase::Working => scratch.timeout += 300_000,
                TxPhase::Unverified => scratch.timeout += 900_000,
                TxPhase::Finished | TxPhase::WorkDisputed | TxPhase::ResultDisputed => {
                    scratch.timeout = now
                }
                _ => {}
            }
        }

        debug!(
            from = message.from.as_str(),
            pre = message.pre_phase.as_str(),
            post = message.post_phase.as_str(),
            "message accepted"
        );
        *tx = scratch;
        message.accepted = true;
        message
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn apply(
    kind: MessageKind,
    tx: &mut Transaction,
    arguments: &BTreeMap<String, String>,
    verifier: &dyn SignatureService,
) -> Result<()> {
    match kind {
        MessageKind::WorkHashes => {
            tx.work_hash = Some(Thash::parse(&arguments["workhash"])?);
            tx.work_secret_hash = Some(Thash::parse(&arguments["worksecrethash"])?);
            Ok(())
        }
        MessageKind::WorkerUrl => {
            tx.worker_url = Some(parse_worker_url(&arguments["workerurl"])?);
            Ok(())
        }
        MessageKind::BuyerSecret => {
            let secret = Thash::parse(&arguments["buyersecret"])?;
            let work_hash = tx
                .work_hash
                .ok_or_else(|| MarketError::validation("Work hash not set"))?;
            let expected = tx
                .work_secret_hash
                .ok_or_else(|| MarketError::validation("Work secret hash not set"))?;

            let mut hasher = Sha256::new();
            hasher.update(work_hash.0);
            hasher.update(secret.0);
            let digest: [u8; 32] = hasher.finalize().into();
            if digest != expected.0 {
                return Err(MarketError::validation(
                    "Buyer's secret does not match work secret hash",
                ));
            }
            tx.buyer_secret = Some(secret);
            Ok(())
        }
        MessageKind::RejectWork => Ok(()),
        MessageKind::TransmitFinished => {
            let hash = Thash::parse(&arguments["encresulthash"])?;
            let signature = arguments["encresulthashsig"].clone();
            let key = Thash::parse(&arguments["encresultkey"])?;
            // The receipt must be countersigned by the buyer.
            verifier.verify(&hash.to_string(), &tx.buyer, &signature)?;
            tx.encrypted_result_receipt = Some(Treceipt { hash, hash_signature: signature });
            tx.result_decryption_key = Some(key);
            Ok(())
        }
        MessageKind::RejectResult => Ok(()),
        MessageKind::AcceptResult => Ok(()),
    }
}

/// Worker URLs must be plain absolute http URLs. The worker endpoint is
/// reached from inside the buyer's network, so https is not required here.
fn parse_worker_url(s: &str) -> Result<String> {
    let rest = s
        .strip_prefix("http://")
        .ok_or_else(|| MarketError::validation(format!("Invalid worker URL: {}", s)))?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MarketError::validation(format!("Invalid worker URL: {}", s)));
    }
    Ok(s.to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================
