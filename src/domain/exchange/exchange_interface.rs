//! Interfaces of the external exchange the swap helper runs on

use solana_sdk::pubkey::Pubkey;
use crate::domain::swap::Route;
use crate::shared::errors::SwapError;
use crate::shared::types::PoolReserves;

/// Current reserves of two-asset pools
pub trait ReserveOracle {
    /// Reserves of the `asset_a` / `asset_b` pool ordered as `(asset_a, asset_b)`.
    /// `Ok(None)` means there is no such pool.
    fn get_reserves(&self, asset_a: &Pubkey, asset_b: &Pubkey) -> Result<Option<PoolReserves>, SwapError>;
}

/// Token balances and transfer authorizations
pub trait AssetLedger {
    fn balance_of(&self, asset: &Pubkey, owner: &Pubkey) -> u64;

    fn allowance(&self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64;

    fn approve(&mut self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64);

    /// Moves `amount` from `owner` to `spender`, consuming the owner's prior approval.
    fn transfer_from(&mut self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) -> Result<(), SwapError>;

    fn transfer(&mut self, asset: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), SwapError>;
}

/// Swap execution engine of the exchange
pub trait ExchangeEngine {
    /// Sells exactly `amount_in` taken from `payer`, delivers the output to `recipient`.
    /// Fails without side effects when the output would be under `min_amount_out`.
    fn execute_swap(
        &mut self,
        route: &Route,
        payer: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
        recipient: &Pubkey,
    ) -> Result<u64, SwapError>;

    /// Buys exactly `amount_out` for `recipient`, spending at most `max_amount_in` of `payer`.
    /// Returns the input actually spent.
    fn execute_swap_exact_out(
        &mut self,
        route: &Route,
        payer: &Pubkey,
        amount_out: u64,
        max_amount_in: u64,
        recipient: &Pubkey,
    ) -> Result<u64, SwapError>;
}

/// Wrapping of the native currency into its token form
pub trait NativeWrapper {
    fn native_balance(&self, owner: &Pubkey) -> u64;

    /// Debits `lamports` of native currency from `from` and credits the same amount
    /// of the wrapped-native asset to `to`.
    fn deposit_native(&mut self, from: &Pubkey, to: &Pubkey, lamports: u64) -> Result<(), SwapError>;
}

/// Everything a swap touches, plus all-or-nothing execution
pub trait Ledger: ReserveOracle + AssetLedger + ExchangeEngine + NativeWrapper {
    /// Runs `op` as one transaction: if it fails, the ledger is left exactly as it was.
    fn atomically<T, F>(&mut self, op: F) -> Result<T, SwapError>
    where
        F: FnOnce(&mut Self) -> Result<T, SwapError>;
}
