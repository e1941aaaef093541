//! Route resolution from an input asset to the settlement asset

use std::fmt;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::domain::exchange::ReserveOracle;
use crate::shared::errors::SwapError;
use crate::shared::types::{null_asset, pubkey_string, PoolReserves};

/// Pool path a conversion takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// The asset trades directly against the settlement asset
    Direct {
        #[serde(with = "pubkey_string")]
        asset: Pubkey,
        #[serde(with = "pubkey_string")]
        settlement: Pubkey,
    },
    /// The asset is the wrapped native currency, traded on its dedicated pool
    WrappedNative {
        #[serde(with = "pubkey_string")]
        wrapped: Pubkey,
        #[serde(with = "pubkey_string")]
        settlement: Pubkey,
    },
}

impl Route {
    pub fn asset_in(&self) -> Pubkey {
        match self {
            Route::Direct { asset, .. } => *asset,
            Route::WrappedNative { wrapped, .. } => *wrapped,
        }
    }

    pub fn asset_out(&self) -> Pubkey {
        match self {
            Route::Direct { settlement, .. } | Route::WrappedNative { settlement, .. } => *settlement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Direct { .. } => "direct",
            Route::WrappedNative { .. } => "wrapped-native",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.as_str(), self.asset_in(), self.asset_out())
    }
}

/// Picks the route for `asset` and reads the reserves of its pool.
///
/// The wrapped-native handle always takes the wrapped-native pool; any other
/// asset must have a direct pool against the settlement asset. There is no
/// fallback search.
pub fn resolve_route<O: ReserveOracle + ?Sized>(
    oracle: &O,
    asset: &Pubkey,
    settlement: &Pubkey,
    wrapped_native: &Pubkey,
) -> Result<(Route, PoolReserves), SwapError> {
    if asset == settlement {
        return Err(SwapError::InvalidInput("cannot convert the settlement asset into itself".to_string()));
    }
    if *asset == null_asset() {
        return Err(SwapError::InvalidInput("missing asset".to_string()));
    }

    let route = if asset == wrapped_native {
        Route::WrappedNative {
            wrapped: *wrapped_native,
            settlement: *settlement,
        }
    } else {
        Route::Direct {
            asset: *asset,
            settlement: *settlement,
        }
    };

    let reserves = oracle
        .get_reserves(&route.asset_in(), &route.asset_out())?
        .ok_or(SwapError::UnsupportedRoute(*asset))?;
    if reserves.is_empty() {
        return Err(SwapError::EmptyLiquidity {
            asset_a: route.asset_in(),
            asset_b: route.asset_out(),
        });
    }

    debug!("Resolved {} with reserves {} / {}", route, reserves.reserve_in, reserves.reserve_out);
    Ok((route, reserves))
}
