//! Core data types for the marketplace.
//!
//! ## Types
//!
//! - [`Money`]: currency-tagged fixed-point amount
//! - [`Bid`]: a standing buy/sell order with its escrow lifecycle
//! - [`Transaction`]: the binding agreement created when two bids match
//! - [`Tmessage`]: append-only audit record of a protocol message
//!
//! All enums have canonical string encodings (e.g. phase `"ESTABLISHING"`,
//! bid state `"INQUEUE"`) which are also their serde representations; any
//! text-based API built on top must preserve them.

// Canonical-string serde for the enums below: serialize via `as_str`,
// deserialize via `parse`.
macro_rules! string_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use string_serde;

mod bid;
mod money;
mod tx;

pub use bid::{ArticleId, Bid, BidState, BidType};
pub use money::{unit_by_symbol, Currency, Money, Unit};
pub use tx::{Origin, Thash, Tmessage, Transaction, Treceipt, TxPhase, TxState};

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;
