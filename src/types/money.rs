//! Monetary amounts: currency-tagged fixed-point integers.
//!
//! ## Why Fixed-Point?
//!
//! All amounts are stored as an `i64` count of the currency's smallest unit
//! (satoshi for BTC, a billionth for fiat). Parsing, formatting and
//! arithmetic use exact integer math only, no floating point anywhere, so
//! amounts never drift and results are identical on every platform.
//!
//! ## Units
//!
//! Each currency has a table of units (symbol + factor). Formatting selects
//! the largest *selectable* unit that produces a non-zero integer part,
//! falling back to the smallest selectable unit for tiny amounts.
//!
//! ## Currency Safety
//!
//! Mixing currencies in `add`/`sub`/`min`/`max` is a programmer error and
//! panics. Callers must guarantee currency equality by construction;
//! validation code that wants a recoverable error checks currencies first.
//!
//! ## Example
//!
//! ```
//! use trade_kernel::types::Money;
//!
//! let price: Money = "mBTC 10".parse().unwrap();
//! let fee: Money = "mBTC 1".parse().unwrap();
//! assert_eq!(price.add(fee).to_string(), "mBTC 11");
//! assert_eq!(price.amount, 1_000_000); // satoshi
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MarketError;

/// Largest representable base-unit magnitude; amounts at or above this are
/// rejected at parse time.
const MAX_AMOUNT: i128 = 1_000_000_000_000_000_000; // 10^18

// ============================================================================
// Currency
// ============================================================================

/// Supported currencies. BTC is the marketplace's principal currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Currency {
    #[default]
    Btc,
    Eur,
    Usd,
    Brl,
    Gbp,
}

impl Currency {
    /// Canonical string form (`"BTC"`, `"EUR"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Brl => "BRL",
            Currency::Gbp => "GBP",
        }
    }

    /// Parse the canonical string form.
    pub fn parse(s: &str) -> Result<Self, MarketError> {
        match s {
            "BTC" => Ok(Currency::Btc),
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "BRL" => Ok(Currency::Brl),
            "GBP" => Ok(Currency::Gbp),
            _ => Err(MarketError::validation(format!("Unknown currency: {}", s))),
        }
    }

    /// The unit used to format a zero amount: the currency's largest
    /// selectable unit.
    pub fn default_unit(self) -> Unit {
        units_of(self)
            .next()
            .expect("every currency has at least one unit")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit
// ============================================================================

/// A display/input unit for some currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Symbol written in front of the amount (`"mBTC"`, `"€"`, ...).
    pub symbol: &'static str,
    /// Currency the unit belongs to.
    pub currency: Currency,
    /// The unit's value in multiples of the base (smallest) unit.
    pub factor: i64,
    /// Whether formatting may auto-select this unit.
    pub selectable: bool,
}

/// Unit table, ordered largest-first per currency.
const UNITS: [Unit; 12] = [
    Unit { symbol: "BTC", currency: Currency::Btc, factor: 100_000_000, selectable: true },
    Unit { symbol: "mBTC", currency: Currency::Btc, factor: 100_000, selectable: true },
    Unit { symbol: "uBTC", currency: Currency::Btc, factor: 100, selectable: true },
    Unit { symbol: "satoshi", currency: Currency::Btc, factor: 1, selectable: false },
    Unit { symbol: "EUR", currency: Currency::Eur, factor: 1_000_000_000, selectable: true },
    Unit { symbol: "€", currency: Currency::Eur, factor: 1_000_000_000, selectable: false },
    Unit { symbol: "USD", currency: Currency::Usd, factor: 1_000_000_000, selectable: true },
    Unit { symbol: "$", currency: Currency::Usd, factor: 1_000_000_000, selectable: false },
    Unit { symbol: "BRL", currency: Currency::Brl, factor: 1_000_000_000, selectable: true },
    Unit { symbol: "R$", currency: Currency::Brl, factor: 1_000_000_000, selectable: false },
    Unit { symbol: "GBP", currency: Currency::Gbp, factor: 1_000_000_000, selectable: true },
    Unit { symbol: "£", currency: Currency::Gbp, factor: 1_000_000_000, selectable: false },
];

/// Look up a unit by its symbol.
pub fn unit_by_symbol(symbol: &str) -> Option<Unit> {
    UNITS.iter().find(|u| u.symbol == symbol).copied()
}

/// All units of a currency, largest-first.
fn units_of(currency: Currency) -> impl Iterator<Item = Unit> {
    UNITS.iter().filter(move |u| u.currency == currency).copied()
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol)
    }
}

// ============================================================================
// Money
// ============================================================================

/// A monetary amount: `i64` base units tagged with a currency.
///
/// Immutable value type. All operations return new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Money {
    /// Amount in the currency's smallest unit (may be negative).
    pub amount: i64,
    /// The currency the amount is denominated in.
    pub currency: Currency,
}

impl Money {
    /// A zero amount in the given currency.
    pub fn zero(currency: Currency) -> Money {
        Money { amount: 0, currency }
    }

    /// Parse from the textual grammar
    /// `<unit-symbol><optional space><optional '-'><digits>(.<digits>)?`.
    ///
    /// Rejected inputs:
    /// - unknown unit symbol
    /// - more fractional digits than the unit's factor carries
    /// - integral part at or above 10^18 base units
    pub fn parse(s: &str) -> Result<Money, MarketError> {
        // Split the leading unit symbol from the numeric part. Symbols are
        // runs of letters or one of the currency signs.
        let sym_len = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphabetic() || matches!(c, '€' | '$' | '£')))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (symbol, mut rest) = s.split_at(sym_len);

        let unit = unit_by_symbol(symbol).ok_or_else(|| {
            MarketError::validation(format!(
                "Input doesn't match pattern for monetary amounts: {}",
                s
            ))
        })?;

        rest = rest.strip_prefix(' ').unwrap_or(rest);

        let negative = if let Some(stripped) = rest.strip_prefix('-') {
            rest = stripped;
            true
        } else {
            false
        };

        let amount = parse_scaled(rest, unit.factor)
            .map_err(|msg| MarketError::validation(format!("{} in {}", msg, s)))?;

        Ok(Money {
            amount: if negative { -amount } else { amount },
            currency: unit.currency,
        })
    }

    /// Selects a unit of suitable scale for formatting: the largest
    /// selectable unit whose factor does not exceed the amount, falling back
    /// to the smallest selectable unit for amounts below all of them.
    pub fn select_unit(self) -> Unit {
        let v = self.amount.unsigned_abs() as i64;
        if v == 0 {
            return self.currency.default_unit();
        }

        let mut result = None;
        for unit in units_of(self.currency) {
            if unit.selectable {
                result = Some(unit);
            }
            if unit.factor <= v && result.is_some() {
                break;
            }
        }
        result.expect("every currency has a selectable unit")
    }

    /// Format in a specific unit.
    ///
    /// # Panics
    ///
    /// Panics if the unit belongs to a different currency (programmer error).
    pub fn format(self, unit: Unit, include_symbol: bool) -> String {
        assert_eq!(
            self.currency, unit.currency,
            "Currencies don't match: [{}] [{} -> {}]",
            self.currency, unit.symbol, unit.currency
        );

        let (v, sign) = if self.amount < 0 {
            (self.amount.unsigned_abs() as i64, "-")
        } else {
            (self.amount, "")
        };
        if include_symbol {
            format!("{} {}{}", unit.symbol, sign, format_amount(v, unit.factor))
        } else {
            format!("{}{}", sign, format_amount(v, unit.factor))
        }
    }

    /// Sum of two amounts. Panics on currency mismatch.
    pub fn add(self, other: Money) -> Money {
        assert_eq!(self.currency, other.currency, "Currencies don't match in add()");
        Money { amount: self.amount + other.amount, currency: self.currency }
    }

    /// Difference of two amounts. Panics on currency mismatch.
    pub fn sub(self, other: Money) -> Money {
        assert_eq!(self.currency, other.currency, "Currencies don't match in sub()");
        Money { amount: self.amount - other.amount, currency: self.currency }
    }

    /// Negation.
    pub fn neg(self) -> Money {
        Money { amount: -self.amount, currency: self.currency }
    }

    /// The lesser of two amounts. Panics on currency mismatch.
    pub fn min(self, other: Money) -> Money {
        assert_eq!(self.currency, other.currency, "Currencies don't match in min()");
        Money { amount: self.amount.min(other.amount), currency: self.currency }
    }

    /// The greater of two amounts. Panics on currency mismatch.
    pub fn max(self, other: Money) -> Money {
        assert_eq!(self.currency, other.currency, "Currencies don't match in max()");
        Money { amount: self.amount.max(other.amount), currency: self.currency }
    }

    /// True if the amount is exactly zero.
    pub fn is_zero(self) -> bool {
        self.amount == 0
    }
}

/// Parse the numeric part (`digits(.digits)?`) scaled by the unit factor.
///
/// `rust_decimal` supplies exact mantissa/scale extraction; the scaling to
/// base units is integer math.
fn parse_scaled(s: &str, factor: i64) -> Result<i64, String> {
    // Enforce the grammar strictly before handing to Decimal, which is more
    // lenient (signs, "1.", ".5").
    let mut parts = s.split('.');
    let integral = parts.next().unwrap_or("");
    let fractional = parts.next();
    if parts.next().is_some()
        || integral.is_empty()
        || !integral.bytes().all(|b| b.is_ascii_digit())
        || !fractional.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err("Input doesn't match pattern for monetary amounts".to_string());
    }

    let decimal = Decimal::from_str(s).map_err(|_| "Too many digits".to_string())?;
    let pow = 10i128
        .checked_pow(decimal.scale())
        .ok_or_else(|| "Too many digits in fractional part".to_string())?;
    if (factor as i128) % pow != 0 {
        return Err("Too many digits in fractional part".to_string());
    }

    let amount = decimal.mantissa() * (factor as i128 / pow);
    if amount >= MAX_AMOUNT {
        return Err("Too many digits in integral part".to_string());
    }
    Ok(amount as i64)
}

/// Format a non-negative base-unit value in a unit of the given factor,
/// using exact integer long division. Never emits redundant zeros.
fn format_amount(v: i64, factor: i64) -> String {
    let int_part = v / factor;
    let mut frac_part = v - int_part * factor;

    let mut result = int_part.to_string();
    if frac_part == 0 {
        return result;
    }

    result.push('.');
    let mut base = factor / 10;
    while base > 0 && frac_part > 0 {
        let digit = frac_part / base;
        result.push((b'0' + digit as u8) as char);
        frac_part -= digit * base;
        base /= 10;
    }
    result
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(self.select_unit(), true))
    }
}

impl FromStr for Money {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

// Canonical wire form is the display string, e.g. "mBTC 1.5".
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Money::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
