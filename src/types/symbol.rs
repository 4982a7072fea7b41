use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument symbol for an inverse perpetual contract (e.g. "BTCUSD").
/// Uses NewType pattern for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol from a string
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Settlement coin of the inverse contract: the first three
    /// characters of the symbol ("BTCUSD" settles in "BTC").
    pub fn coin(&self) -> &str {
        if self.0.len() >= 3 {
            &self.0[..3]
        } else {
            &self.0
        }
    }

    /// Check if symbol is plausible (basic validation)
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() >= 3 && self.0.len() <= 20
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
