// Supported coins
// Payout addresses and ledger rows are keyed by one of these symbols

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coin accepted by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Coin {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "BCH")]
    Bch,
    #[serde(rename = "DASH")]
    Dash,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "LTC")]
    Ltc,
}

impl Coin {
    /// All supported coins in display order
    pub fn list() -> &'static [Coin] {
        &[Coin::Btc, Coin::Bch, Coin::Dash, Coin::Eth, Coin::Ltc]
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Coin::Btc => "BTC",
            Coin::Bch => "BCH",
            Coin::Dash => "DASH",
            Coin::Eth => "ETH",
            Coin::Ltc => "LTC",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coin: {0}")]
pub struct InvalidCoin(pub String);

impl FromStr for Coin {
    type Err = InvalidCoin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coin::list()
            .iter()
            .copied()
            .find(|c| c.symbol() == s)
            .ok_or_else(|| InvalidCoin(s.to_string()))
    }
}
