use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BookError;

const MAX_SYMBOL_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner tag carried through to trades. Entitlement checks happen upstream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Uppercases the input; accepts `A-Z 0-9 . _ - /` up to 16 characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, BookError> {
        let upper = raw.as_ref().trim().to_ascii_uppercase();
        let valid_chars = upper
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
        if upper.is_empty() || upper.len() > MAX_SYMBOL_LEN || !valid_chars {
            return Err(BookError::InvalidSymbol(raw.as_ref().to_string()));
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum price increment of a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickSize(Decimal);

impl TickSize {
    pub const CENT: TickSize = TickSize(Decimal::from_parts(1, 0, 0, false, 2));

    pub fn new(value: Decimal) -> Result<Self, BookError> {
        if value <= Decimal::ZERO {
            return Err(BookError::InvalidTickSize(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_aligned(self, value: Decimal) -> bool {
        (value % self.0).is_zero()
    }
}

impl Default for TickSize {
    fn default() -> Self {
        Self::CENT
    }
}

impl fmt::Display for TickSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exact positive price on a tick grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub fn new(value: Decimal, tick: TickSize) -> Result<Self, BookError> {
        if value <= Decimal::ZERO {
            return Err(BookError::InvalidPrice {
                value,
                reason: "must be positive",
            });
        }
        if !tick.is_aligned(value) {
            return Err(BookError::InvalidPrice {
                value,
                reason: "not a multiple of the tick size",
            });
        }
        Ok(Self(value))
    }

    /// Price on a 0.01 grid, e.g. `15050` is 150.50.
    pub fn from_cents(cents: i64) -> Result<Self, BookError> {
        Self::new(Decimal::new(cents, 2), TickSize::CENT)
    }

    pub fn parse(raw: &str, tick: TickSize) -> Result<Self, BookError> {
        let value = Decimal::from_str(raw.trim()).map_err(|_| BookError::InvalidPrice {
            value: Decimal::ZERO,
            reason: "not a decimal number",
        })?;
        Self::new(value, tick)
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whole lots. Zero only exists inside the engine for exhausted orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u64);

impl Quantity {
    pub fn new(value: u64) -> Result<Self, BookError> {
        if value == 0 {
            return Err(BookError::InvalidQuantity {
                value,
                reason: "must be greater than zero",
            });
        }
        Ok(Self(value))
    }

    pub(crate) const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_alignment_is_exact() {
        let tick = TickSize::new(Decimal::new(5, 2)).unwrap();
        assert!(Price::new(Decimal::new(15005, 2), tick).is_ok());
        assert!(matches!(
            Price::new(Decimal::new(15003, 2), tick),
            Err(BookError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn cent_tick_matches_two_decimal_places() {
        assert_eq!(TickSize::CENT.value(), Decimal::new(1, 2));
        assert!(Price::from_cents(1).is_ok());
        assert!(Price::new(Decimal::new(1001, 3), TickSize::CENT).is_err());
    }

    #[test]
    fn prices_order_numerically_regardless_of_scale() {
        let a = Price::parse("150.0", TickSize::CENT).unwrap();
        let b = Price::parse("150.00", TickSize::CENT).unwrap();
        let c = Price::parse("150.01", TickSize::CENT).unwrap();
        assert_eq!(a, b);
        assert!(b < c);
    }

    #[test]
    fn symbol_is_normalised() {
        assert_eq!(Symbol::new(" btc-usd ").unwrap().as_str(), "BTC-USD");
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("way-too-long-symbol-name").is_err());
        assert!(Symbol::new("AB CD").is_err());
    }
}
