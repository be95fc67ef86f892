//! Symbol: a six-digit exchange-listed equity code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Listing venue, derived from the leading digit of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// Two-letter suffix used by most vendors (`SH`, `SZ`, `BJ`).
    pub fn suffix(self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
            Exchange::Beijing => "BJ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("invalid symbol '{0}': expected six ASCII digits")]
    InvalidCode(String),
}

/// Immutable equity identifier. Used as the key for caching and indicator computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse a code such as `600519`. Surrounding whitespace is ignored.
    pub fn parse(code: &str) -> Result<Self, SymbolError> {
        let code = code.trim();
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(SymbolError::InvalidCode(code.to_string()))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Exchange by leading digit; unknown prefixes default to Shanghai.
    pub fn exchange(&self) -> Exchange {
        match self.0.as_bytes()[0] {
            b'0' | b'3' => Exchange::Shenzhen,
            b'4' | b'8' => Exchange::Beijing,
            _ => Exchange::Shanghai,
        }
    }

    /// `600519.SH` form.
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.0, self.exchange().suffix())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}
