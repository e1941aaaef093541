//! Error handling for the swap helper and token registry

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Swap-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No route from {0} to the settlement asset")]
    UnsupportedRoute(Pubkey),

    #[error("Pool {asset_a} / {asset_b} has no liquidity")]
    EmptyLiquidity { asset_a: Pubkey, asset_b: Pubkey },

    #[error("Slippage above {max_bps} bps: price impact is {impact_bps} bps")]
    SlippageExceeded { impact_bps: u64, max_bps: u64 },

    #[error("Transfer of {required} not authorized (allowance {approved})")]
    TransferAuthorizationMissing { required: u64, approved: u64 },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Insufficient liquidity: requested {requested}, pool holds {available}")]
    InsufficientLiquidity { requested: u64, available: u64 },

    #[error("Asset {0} is not convertible")]
    AssetNotConvertible(Pubkey),

    #[error("Swap execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Arithmetic overflow in {0}")]
    MathOverflow(&'static str),

    #[error("Reserve oracle error: {0}")]
    Oracle(String),
}

/// Token registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Missing token")]
    InvalidAsset,

    #[error("The token {0} is already supported")]
    AlreadySupported(Pubkey),

    #[error("The token {0} is not supported")]
    NotSupported(Pubkey),

    #[error("The token {0} is not paused")]
    NotPaused(Pubkey),

    #[error("Registry storage error: {0}")]
    Storage(String),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
