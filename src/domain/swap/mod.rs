//! Swap domain - quoting and executing conversions into the settlement asset

mod route;
mod quoter;
mod swap_helper;

pub use route::{resolve_route, Route};
pub use quoter::Quoter;
pub use swap_helper::SwapHelper;

use serde::{Deserialize, Serialize};
use crate::shared::types::PoolReserves;

/// Quoting and execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSettings {
    /// Fee the exchange engine charges on the input, in basis points
    pub fee_bps: u32,
    /// Largest accepted price impact, in basis points
    pub max_price_impact_bps: u64,
    /// How far under the quote the engine may fill before the swap is rejected
    pub min_out_tolerance_bps: u32,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            fee_bps: 30,
            max_price_impact_bps: 200,
            min_out_tolerance_bps: 10,
        }
    }
}

/// Exact-input quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub route: Route,
    pub amount_in: u64,
    pub amount_out: u64,
    pub price_impact_bps: u64,
    pub reserves: PoolReserves,
}

/// Exact-output quote: what must be paid in to receive `settlement_out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementQuote {
    pub route: Route,
    pub settlement_out: u64,
    /// Input at the spot price, before fee and impact
    pub linear_input: u64,
    /// Input the engine itself needs
    pub engine_input: u64,
    pub impact_permille: u64,
    pub premium_permille: u64,
    /// What the caller pays
    pub required_input: u64,
    /// Part of `engine_input` the caller's payment does not cover, paid from custody
    pub subsidy: u64,
    pub reserves: PoolReserves,
}

/// Result of an executed swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub route: Route,
    pub amount_in: u64,
    pub amount_out: u64,
    pub min_amount_out: u64,
    /// Input kept in helper custody after the engine filled the trade
    pub retained: u64,
    /// Input custody added on top of the caller's payment
    pub subsidy: u64,
}
