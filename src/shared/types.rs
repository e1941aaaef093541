//! Common types used across the crate

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Reserves of a two-asset pool, ordered the way they were requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    pub reserve_in: u64,
    pub reserve_out: u64,
}

impl PoolReserves {
    pub fn new(reserve_in: u64, reserve_out: u64) -> Self {
        Self {
            reserve_in,
            reserve_out,
        }
    }

    /// Same pool seen from the other side.
    pub fn flipped(self) -> Self {
        Self::new(self.reserve_out, self.reserve_in)
    }

    /// A pool with an empty side has no market.
    pub fn is_empty(&self) -> bool {
        self.reserve_in == 0 || self.reserve_out == 0
    }
}

/// Serde adapter writing a `Pubkey` as its base58 string
pub mod pubkey_string {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The null asset handle
pub fn null_asset() -> Pubkey {
    Pubkey::default()
}

/// Mint of the wrapped native currency (wSOL)
pub fn native_mint() -> Pubkey {
    Pubkey::new_from_array(spl_token::native_mint::id().to_bytes())
}
