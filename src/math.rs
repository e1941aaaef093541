// src/math.rs
//! Constant-product arithmetic shared by the swap helper and the in-memory engine.
//!
//! Amounts are `u64` raw token units; every intermediate product is taken in
//! `u128` with checked operations.

use crate::shared::errors::SwapError;

pub const BPS_DENOMINATOR: u64 = 10_000;
pub const PERMILLE_DENOMINATOR: u64 = 1_000;

/// Premium charged by exact-output quotes when the impact is fully explained by the fee
pub const DEFAULT_PREMIUM_PERMILLE: u64 = 5;

type Result<T> = std::result::Result<T, SwapError>;

fn fee_complement(fee_bps: u32) -> Result<u128> {
    if u64::from(fee_bps) >= BPS_DENOMINATOR {
        return Err(SwapError::InvalidInput(format!("fee of {} bps leaves nothing to trade", fee_bps)));
    }
    Ok(u128::from(BPS_DENOMINATOR - u64::from(fee_bps)))
}

/// An empty side means the pool cannot fill any amount
fn ensure_reserves(requested: u64, reserve_in: u64, reserve_out: u64) -> Result<()> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(SwapError::InsufficientLiquidity { requested, available: 0 });
    }
    Ok(())
}

fn narrow(value: u128, what: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| SwapError::MathOverflow(what))
}

/// Output of an exact-input trade.
///
/// `dy = y * dx' / (x * 10000 + dx')` with `dx' = dx * (10000 - fee_bps)`,
/// rounded down so the pool never pays more than the invariant allows.
pub fn get_amount_out(amount_in: u64, reserve_in: u64, reserve_out: u64, fee_bps: u32) -> Result<u64> {
    ensure_reserves(amount_in, reserve_in, reserve_out)?;
    let in_with_fee = u128::from(amount_in)
        .checked_mul(fee_complement(fee_bps)?)
        .ok_or(SwapError::MathOverflow("input after fee"))?;
    let numerator = in_with_fee
        .checked_mul(u128::from(reserve_out))
        .ok_or(SwapError::MathOverflow("amount out numerator"))?;
    let denominator = u128::from(reserve_in)
        .checked_mul(u128::from(BPS_DENOMINATOR))
        .and_then(|d| d.checked_add(in_with_fee))
        .ok_or(SwapError::MathOverflow("amount out denominator"))?;
    narrow(numerator / denominator, "amount out")
}

/// Input the engine needs to deliver exactly `amount_out`.
///
/// `dx = x * dy * 10000 / ((y - dy) * (10000 - fee_bps)) + 1`
pub fn get_amount_in(amount_out: u64, reserve_in: u64, reserve_out: u64, fee_bps: u32) -> Result<u64> {
    ensure_reserves(amount_out, reserve_in, reserve_out)?;
    if amount_out >= reserve_out {
        return Err(SwapError::InsufficientLiquidity {
            requested: amount_out,
            available: reserve_out,
        });
    }
    let numerator = u128::from(reserve_in)
        .checked_mul(u128::from(amount_out))
        .and_then(|n| n.checked_mul(u128::from(BPS_DENOMINATOR)))
        .ok_or(SwapError::MathOverflow("amount in numerator"))?;
    let denominator = u128::from(reserve_out - amount_out)
        .checked_mul(fee_complement(fee_bps)?)
        .ok_or(SwapError::MathOverflow("amount in denominator"))?;
    narrow(numerator / denominator + 1, "amount in")
}

/// Spot-price conversion of `amount` with no fee and no impact
pub fn linear_quote(amount: u64, reserve_a: u64, reserve_b: u64) -> Result<u64> {
    ensure_reserves(amount, reserve_a, reserve_b)?;
    let numerator = u128::from(amount)
        .checked_mul(u128::from(reserve_b))
        .ok_or(SwapError::MathOverflow("linear quote"))?;
    narrow(numerator / u128::from(reserve_a), "linear quote")
}

/// Spot value `amount_in * reserve_out` and realized value `amount_out * reserve_in`
/// of a trade, on the common scale `reserve_in * reserve_out`.
fn spot_and_realized(amount_in: u64, amount_out: u64, reserve_in: u64, reserve_out: u64) -> (u128, u128) {
    // u64 * u64 always fits in u128
    let spot = u128::from(amount_in) * u128::from(reserve_out);
    let realized = u128::from(amount_out) * u128::from(reserve_in);
    (spot, realized)
}

/// Price impact of a trade in basis points, rounded down.
///
/// This is the relative gap between the marginal price `reserve_out / reserve_in`
/// and the average price `amount_out / amount_in`, so the pool fee is part of it.
pub fn price_impact_bps(amount_in: u64, amount_out: u64, reserve_in: u64, reserve_out: u64) -> Result<u64> {
    if amount_in == 0 || reserve_out == 0 {
        return Ok(0);
    }
    let (spot, realized) = spot_and_realized(amount_in, amount_out, reserve_in, reserve_out);
    if realized >= spot {
        return Ok(0);
    }
    let scaled = (spot - realized)
        .checked_mul(u128::from(BPS_DENOMINATOR))
        .ok_or(SwapError::MathOverflow("price impact"))?;
    narrow(scaled / spot, "price impact")
}

/// Exact check of `impact > max_impact_bps` without rounding
pub fn exceeds_price_impact(
    amount_in: u64,
    amount_out: u64,
    reserve_in: u64,
    reserve_out: u64,
    max_impact_bps: u64,
) -> Result<bool> {
    let (spot, realized) = spot_and_realized(amount_in, amount_out, reserve_in, reserve_out);
    if realized >= spot {
        return Ok(false);
    }
    let lhs = (spot - realized)
        .checked_mul(u128::from(BPS_DENOMINATOR))
        .ok_or(SwapError::MathOverflow("price impact"))?;
    let rhs = spot
        .checked_mul(u128::from(max_impact_bps))
        .ok_or(SwapError::MathOverflow("price impact limit"))?;
    Ok(lhs > rhs)
}

/// Calculate minimum output amount with slippage protection
pub fn min_amount_out(amount_out: u64, tolerance_bps: u32) -> u64 {
    let tolerance = u64::from(tolerance_bps).min(BPS_DENOMINATOR);
    // amount_out * tolerance / 10000 <= amount_out, so the cast is lossless
    let cut = (u128::from(amount_out) * u128::from(tolerance) / u128::from(BPS_DENOMINATOR)) as u64;
    amount_out - cut
}

/// How far, in per mille, the engine's required input sits above the linear quote
pub fn impact_permille(engine_input: u64, linear_input: u64) -> Result<u64> {
    if linear_input == 0 {
        return Err(SwapError::InvalidInput("amount too small to price".to_string()));
    }
    let excess = u128::from(engine_input.saturating_sub(linear_input));
    let scaled = excess
        .checked_mul(u128::from(PERMILLE_DENOMINATOR))
        .ok_or(SwapError::MathOverflow("impact permille"))?;
    narrow(scaled / u128::from(linear_input), "impact permille")
}

/// Premium an exact-output quote adds on top of the linear input.
///
/// The pool fee is already paid by the engine, so it is taken off the impact;
/// when nothing is left the default premium applies.
pub fn premium_permille(impact_permille: u64, fee_bps: u32) -> u64 {
    let fee_permille = u64::from(fee_bps) * PERMILLE_DENOMINATOR / BPS_DENOMINATOR;
    match impact_permille.saturating_sub(fee_permille) {
        0 => DEFAULT_PREMIUM_PERMILLE,
        excess => excess,
    }
}

/// `amount * (1000 + premium) / 1000`, rounded down
pub fn apply_premium(amount: u64, premium_permille: u64) -> Result<u64> {
    let surcharge = u128::from(amount)
        .checked_mul(u128::from(premium_permille))
        .ok_or(SwapError::MathOverflow("premium"))?
        / u128::from(PERMILLE_DENOMINATOR);
    narrow(u128::from(amount) + surcharge, "premium")
}
