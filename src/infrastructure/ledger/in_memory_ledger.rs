//! In-memory ledger: token balances, allowances, native currency and
//! constant-product pools with a matching execution engine

use std::collections::HashMap;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::domain::exchange::{AssetLedger, ExchangeEngine, Ledger, NativeWrapper, ReserveOracle};
use crate::domain::swap::Route;
use crate::math;
use crate::shared::errors::SwapError;
use crate::shared::types::{null_asset, PoolReserves};

#[derive(Debug, Clone)]
struct PoolState {
    asset_a: Pubkey,
    reserve_a: u64,
    reserve_b: u64,
    fee_bps: u32,
}

impl PoolState {
    /// Reserves seen from `asset_in`
    fn oriented(&self, asset_in: &Pubkey) -> PoolReserves {
        let reserves = PoolReserves::new(self.reserve_a, self.reserve_b);
        if *asset_in == self.asset_a {
            reserves
        } else {
            reserves.flipped()
        }
    }

    fn settle(&mut self, asset_in: &Pubkey, amount_in: u64, amount_out: u64) -> Result<(), SwapError> {
        let (reserve_in, reserve_out) = if *asset_in == self.asset_a {
            (&mut self.reserve_a, &mut self.reserve_b)
        } else {
            (&mut self.reserve_b, &mut self.reserve_a)
        };
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(SwapError::MathOverflow("pool reserve"))?;
        let new_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(SwapError::InsufficientLiquidity {
                requested: amount_out,
                available: *reserve_out,
            })?;
        *reserve_in = new_in;
        *reserve_out = new_out;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    balances: HashMap<(Pubkey, Pubkey), u64>,
    allowances: HashMap<(Pubkey, Pubkey, Pubkey), u64>,
    native: HashMap<Pubkey, u64>,
    pools: HashMap<(Pubkey, Pubkey), PoolState>,
}

fn pool_key(a: &Pubkey, b: &Pubkey) -> (Pubkey, Pubkey) {
    if a < b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

/// Single-process stand-in for the exchange, its token accounts and the
/// native-currency wrapper.
///
/// The engine prices trades with the same formula as the swap helper so that
/// quotes and fills agree to the unit.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    state: LedgerState,
    wrapped_native: Pubkey,
    default_fee_bps: u32,
}

impl InMemoryLedger {
    pub fn new(wrapped_native: Pubkey, default_fee_bps: u32) -> Self {
        Self {
            state: LedgerState::default(),
            wrapped_native,
            default_fee_bps,
        }
    }

    pub fn wrapped_native(&self) -> Pubkey {
        self.wrapped_native
    }

    pub fn add_pool(&mut self, asset_a: Pubkey, asset_b: Pubkey, reserve_a: u64, reserve_b: u64) -> Result<(), SwapError> {
        self.add_pool_with_fee(asset_a, asset_b, reserve_a, reserve_b, self.default_fee_bps)
    }

    pub fn add_pool_with_fee(
        &mut self,
        asset_a: Pubkey,
        asset_b: Pubkey,
        reserve_a: u64,
        reserve_b: u64,
        fee_bps: u32,
    ) -> Result<(), SwapError> {
        if asset_a == asset_b {
            return Err(SwapError::InvalidInput("pool needs two distinct assets".to_string()));
        }
        if asset_a == null_asset() || asset_b == null_asset() {
            return Err(SwapError::InvalidInput("missing asset".to_string()));
        }
        let key = pool_key(&asset_a, &asset_b);
        if self.state.pools.contains_key(&key) {
            return Err(SwapError::InvalidInput(format!("pool {} / {} already exists", asset_a, asset_b)));
        }
        self.state.pools.insert(
            key,
            PoolState {
                asset_a,
                reserve_a,
                reserve_b,
                fee_bps,
            },
        );
        debug!("Pool {} / {} created with {} / {}", asset_a, asset_b, reserve_a, reserve_b);
        Ok(())
    }

    /// Overwrites the reserves of an existing pool, as other traders would
    pub fn set_reserves(&mut self, asset_a: &Pubkey, asset_b: &Pubkey, reserve_a: u64, reserve_b: u64) -> Result<(), SwapError> {
        let pool = self
            .state
            .pools
            .get_mut(&pool_key(asset_a, asset_b))
            .ok_or(SwapError::UnsupportedRoute(*asset_a))?;
        if pool.asset_a == *asset_a {
            pool.reserve_a = reserve_a;
            pool.reserve_b = reserve_b;
        } else {
            pool.reserve_a = reserve_b;
            pool.reserve_b = reserve_a;
        }
        Ok(())
    }

    pub fn mint(&mut self, asset: &Pubkey, owner: &Pubkey, amount: u64) {
        let balance = self.state.balances.entry((*asset, *owner)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn credit_native(&mut self, owner: &Pubkey, lamports: u64) {
        let balance = self.state.native.entry(*owner).or_insert(0);
        *balance = balance.saturating_add(lamports);
    }

    fn debit(&mut self, asset: &Pubkey, owner: &Pubkey, amount: u64) -> Result<(), SwapError> {
        let available = self.balance_of(asset, owner);
        if available < amount {
            return Err(SwapError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.state.balances.insert((*asset, *owner), available - amount);
        Ok(())
    }

    fn credit(&mut self, asset: &Pubkey, owner: &Pubkey, amount: u64) -> Result<(), SwapError> {
        let balance = self.state.balances.entry((*asset, *owner)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(SwapError::MathOverflow("token balance"))?;
        Ok(())
    }

    fn pool(&self, route: &Route) -> Result<&PoolState, SwapError> {
        self.state
            .pools
            .get(&pool_key(&route.asset_in(), &route.asset_out()))
            .ok_or_else(|| SwapError::ExecutionFailed(format!("no pool for {}", route)))
    }

    fn pool_mut(&mut self, route: &Route) -> Result<&mut PoolState, SwapError> {
        self.state
            .pools
            .get_mut(&pool_key(&route.asset_in(), &route.asset_out()))
            .ok_or_else(|| SwapError::ExecutionFailed(format!("no pool for {}", route)))
    }

    /// Moves the traded amounts once every check has passed
    fn fill(
        &mut self,
        route: &Route,
        payer: &Pubkey,
        amount_in: u64,
        amount_out: u64,
        recipient: &Pubkey,
    ) -> Result<(), SwapError> {
        let available = self.balance_of(&route.asset_in(), payer);
        if available < amount_in {
            return Err(SwapError::InsufficientBalance {
                required: amount_in,
                available,
            });
        }
        let mut pool = self.pool(route)?.clone();
        pool.settle(&route.asset_in(), amount_in, amount_out)?;

        self.debit(&route.asset_in(), payer, amount_in)?;
        self.credit(&route.asset_out(), recipient, amount_out)?;
        *self.pool_mut(route)? = pool;
        debug!("Filled {} -> {} on {}", amount_in, amount_out, route);
        Ok(())
    }
}

impl ReserveOracle for InMemoryLedger {
    fn get_reserves(&self, asset_a: &Pubkey, asset_b: &Pubkey) -> Result<Option<PoolReserves>, SwapError> {
        Ok(self
            .state
            .pools
            .get(&pool_key(asset_a, asset_b))
            .map(|pool| pool.oriented(asset_a)))
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance_of(&self, asset: &Pubkey, owner: &Pubkey) -> u64 {
        self.state.balances.get(&(*asset, *owner)).copied().unwrap_or(0)
    }

    fn allowance(&self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64 {
        self.state
            .allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) {
        self.state.allowances.insert((*asset, *owner, *spender), amount);
    }

    fn transfer_from(&mut self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) -> Result<(), SwapError> {
        let approved = self.allowance(asset, owner, spender);
        if approved < amount {
            return Err(SwapError::TransferAuthorizationMissing {
                required: amount,
                approved,
            });
        }
        self.debit(asset, owner, amount)?;
        self.credit(asset, spender, amount)?;
        // u64::MAX is an unlimited approval
        if approved != u64::MAX {
            self.approve(asset, owner, spender, approved - amount);
        }
        Ok(())
    }

    fn transfer(&mut self, asset: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), SwapError> {
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }
}

impl ExchangeEngine for InMemoryLedger {
    fn execute_swap(
        &mut self,
        route: &Route,
        payer: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
        recipient: &Pubkey,
    ) -> Result<u64, SwapError> {
        let pool = self.pool(route)?;
        let reserves = pool.oriented(&route.asset_in());
        if reserves.is_empty() {
            return Err(SwapError::EmptyLiquidity {
                asset_a: route.asset_in(),
                asset_b: route.asset_out(),
            });
        }
        let amount_out = math::get_amount_out(amount_in, reserves.reserve_in, reserves.reserve_out, pool.fee_bps)?;
        if amount_out < min_amount_out {
            return Err(SwapError::ExecutionFailed(format!(
                "insufficient output amount: {} < {}",
                amount_out, min_amount_out
            )));
        }
        self.fill(route, payer, amount_in, amount_out, recipient)?;
        Ok(amount_out)
    }

    fn execute_swap_exact_out(
        &mut self,
        route: &Route,
        payer: &Pubkey,
        amount_out: u64,
        max_amount_in: u64,
        recipient: &Pubkey,
    ) -> Result<u64, SwapError> {
        let pool = self.pool(route)?;
        let reserves = pool.oriented(&route.asset_in());
        if reserves.is_empty() {
            return Err(SwapError::EmptyLiquidity {
                asset_a: route.asset_in(),
                asset_b: route.asset_out(),
            });
        }
        let amount_in = math::get_amount_in(amount_out, reserves.reserve_in, reserves.reserve_out, pool.fee_bps)?;
        if amount_in > max_amount_in {
            return Err(SwapError::ExecutionFailed(format!(
                "excessive input amount: {} > {}",
                amount_in, max_amount_in
            )));
        }
        self.fill(route, payer, amount_in, amount_out, recipient)?;
        Ok(amount_in)
    }
}

impl NativeWrapper for InMemoryLedger {
    fn native_balance(&self, owner: &Pubkey) -> u64 {
        self.state.native.get(owner).copied().unwrap_or(0)
    }

    fn deposit_native(&mut self, from: &Pubkey, to: &Pubkey, lamports: u64) -> Result<(), SwapError> {
        let available = self.native_balance(from);
        if available < lamports {
            return Err(SwapError::InsufficientBalance {
                required: lamports,
                available,
            });
        }
        let wrapped = self.wrapped_native;
        self.credit(&wrapped, to, lamports)?;
        self.state.native.insert(*from, available - lamports);
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    fn atomically<T, F>(&mut self, op: F) -> Result<T, SwapError>
    where
        F: FnOnce(&mut Self) -> Result<T, SwapError>,
    {
        let snapshot = self.state.clone();
        let result = op(self);
        if result.is_err() {
            self.state = snapshot;
            debug!("Ledger transaction rolled back");
        }
        result
    }
}
