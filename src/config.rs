// 3.0 config.rs: static trading-pair configuration consumed by the funding and
// liquidation engines. all of it is operator-provided and immutable at runtime.

use crate::types::{AccountId, Asset};
use serde::{Deserialize, Serialize};

// One leg of a trading pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinConfig {
    // Asset code, 1-4 characters
    pub code: String,
    // Issuer of the credit asset
    pub issuer: AccountId,
}

impl CoinConfig {
    pub fn new(code: &str, issuer: AccountId) -> Self {
        Self {
            code: code.to_string(),
            issuer,
        }
    }

    pub fn asset(&self) -> Asset {
        Asset::alphanum4(&self.code, self.issuer)
    }
}

// Where the external reference price lives: a data entry under the feed account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub data_name: String,
    pub issuer: AccountId,
}

/// A configured perpetual market: two coins, the settlement (base) asset, and
/// the oracle feed its funding anchors to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub name: String,
    pub coin1: CoinConfig,
    pub coin2: CoinConfig,
    pub base: CoinConfig,
    pub reference_feed: FeedConfig,
}

impl TradingPair {
    /// The leg that is not the base asset, if exactly one of them is the base.
    pub fn non_base_asset(&self) -> Option<Asset> {
        let coin1 = self.coin1.asset();
        let coin2 = self.coin2.asset();
        let base = self.base.asset();
        if coin1 == base {
            Some(coin2)
        } else if coin2 == base {
            Some(coin1)
        } else {
            None
        }
    }
}
