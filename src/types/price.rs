use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Price type using NewType pattern for type safety.
/// Prevents accidental mixing with quantities like Qty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(pub Decimal);

impl Price {
    /// Create a new Price from a Decimal
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Get the underlying Decimal value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Create a Price from a string
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self(decimal))
    }

    /// Absolute distance to another price, e.g. entry to stop.
    pub fn distance(&self, other: Price) -> Decimal {
        (self.0 - other.0).abs()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Serialize as string to preserve precision on the wire and in exports
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(Price(decimal))
    }
}

// Offsetting a price by a scalar distance yields a price (stop/take-profit
// construction from a stop distance)
impl std::ops::Add<Decimal> for Price {
    type Output = Self;

    fn add(self, rhs: Decimal) -> Self {
        Self(self.0 + rhs)
    }
}

impl std::ops::Sub<Decimal> for Price {
    type Output = Self;

    fn sub(self, rhs: Decimal) -> Self {
        Self(self.0 - rhs)
    }
}

// The difference of two prices is a scalar distance, not a price
impl std::ops::Sub for Price {
    type Output = Decimal;

    fn sub(self, other: Self) -> Decimal {
        self.0 - other.0
    }
}
