//! Constant-product quoting against live reserves

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::domain::exchange::ReserveOracle;
use crate::math;
use crate::shared::errors::SwapError;
use super::{resolve_route, SettlementQuote, SwapQuote, SwapSettings};

/// Prices conversions into the settlement asset.
///
/// Holds no reserves: every call reads them from the oracle it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quoter {
    pub settlement: Pubkey,
    pub wrapped_native: Pubkey,
    pub settings: SwapSettings,
}

impl Quoter {
    pub fn new(settlement: Pubkey, wrapped_native: Pubkey, settings: SwapSettings) -> Self {
        Self {
            settlement,
            wrapped_native,
            settings,
        }
    }

    /// Quote for selling exactly `amount_in` of `asset`
    pub fn quote_exact_in<O: ReserveOracle + ?Sized>(
        &self,
        oracle: &O,
        asset: &Pubkey,
        amount_in: u64,
    ) -> Result<SwapQuote, SwapError> {
        if amount_in == 0 {
            return Err(SwapError::InvalidInput("amount in must be positive".to_string()));
        }
        let (route, reserves) = resolve_route(oracle, asset, &self.settlement, &self.wrapped_native)?;

        let amount_out = math::get_amount_out(
            amount_in,
            reserves.reserve_in,
            reserves.reserve_out,
            self.settings.fee_bps,
        )?;
        let price_impact_bps =
            math::price_impact_bps(amount_in, amount_out, reserves.reserve_in, reserves.reserve_out)?;

        if math::exceeds_price_impact(
            amount_in,
            amount_out,
            reserves.reserve_in,
            reserves.reserve_out,
            self.settings.max_price_impact_bps,
        )? {
            warn!(
                "Rejecting {} of {}: price impact {} bps over {} bps",
                amount_in, asset, price_impact_bps, self.settings.max_price_impact_bps
            );
            return Err(SwapError::SlippageExceeded {
                // the floor may sit on the limit while the exact impact is above it
                impact_bps: price_impact_bps.max(self.settings.max_price_impact_bps + 1),
                max_bps: self.settings.max_price_impact_bps,
            });
        }

        debug!("Quoted {} {} -> {} via {} ({} bps impact)", amount_in, asset, amount_out, route, price_impact_bps);
        Ok(SwapQuote {
            route,
            amount_in,
            amount_out,
            price_impact_bps,
            reserves,
        })
    }

    /// Quote for receiving exactly `settlement_out` of the settlement asset
    pub fn quote_exact_out<O: ReserveOracle + ?Sized>(
        &self,
        oracle: &O,
        asset: &Pubkey,
        settlement_out: u64,
    ) -> Result<SettlementQuote, SwapError> {
        if settlement_out == 0 {
            return Err(SwapError::InvalidInput("settlement amount must be positive".to_string()));
        }
        let (route, reserves) = resolve_route(oracle, asset, &self.settlement, &self.wrapped_native)?;

        let linear_input = math::linear_quote(settlement_out, reserves.reserve_out, reserves.reserve_in)?;
        let engine_input = math::get_amount_in(
            settlement_out,
            reserves.reserve_in,
            reserves.reserve_out,
            self.settings.fee_bps,
        )?;
        let impact_permille = math::impact_permille(engine_input, linear_input)?;

        let impact_bps = impact_permille.saturating_mul(10);
        if impact_bps > self.settings.max_price_impact_bps {
            warn!(
                "Rejecting {} settlement out of {}: impact {} bps over {} bps",
                settlement_out, asset, impact_bps, self.settings.max_price_impact_bps
            );
            return Err(SwapError::SlippageExceeded {
                impact_bps,
                max_bps: self.settings.max_price_impact_bps,
            });
        }

        let premium_permille = math::premium_permille(impact_permille, self.settings.fee_bps);
        let required_input = math::apply_premium(linear_input, premium_permille)?;
        let subsidy = engine_input.saturating_sub(required_input);

        debug!(
            "{} {} needed for {} settlement via {} (impact {}‰, premium {}‰)",
            required_input, asset, settlement_out, route, impact_permille, premium_permille
        );
        Ok(SettlementQuote {
            route,
            settlement_out,
            linear_input,
            engine_input,
            impact_permille,
            premium_permille,
            required_input,
            subsidy,
            reserves,
        })
    }
}
