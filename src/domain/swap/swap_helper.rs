//! Swap helper: converts supported assets into the settlement asset

use std::sync::{Arc, RwLock};

use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::domain::exchange::{Ledger, ReserveOracle};
use crate::domain::registry::TokenRegistry;
use crate::math;
use crate::shared::errors::SwapError;
use super::{Quoter, SettlementQuote, SwapQuote, SwapReceipt, SwapSettings};

/// Quotes and executes conversions into the settlement asset on top of a ledger.
///
/// Reserves are read from the ledger on every call. Executions pull the
/// caller's input into `custody`, trade it on the exchange and forward the
/// settlement output, all inside one ledger transaction.
pub struct SwapHelper<L> {
    ledger: L,
    quoter: Quoter,
    custody: Pubkey,
    registry: Option<Arc<RwLock<TokenRegistry>>>,
}

impl<L> SwapHelper<L> {
    pub fn new(
        ledger: L,
        settlement: Pubkey,
        wrapped_native: Pubkey,
        custody: Pubkey,
        settings: SwapSettings,
    ) -> Self {
        Self {
            ledger,
            quoter: Quoter::new(settlement, wrapped_native, settings),
            custody,
            registry: None,
        }
    }

    /// Only convert assets the registry lists as active
    pub fn with_registry(mut self, registry: Arc<RwLock<TokenRegistry>>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn settlement(&self) -> Pubkey {
        self.quoter.settlement
    }

    pub fn wrapped_native(&self) -> Pubkey {
        self.quoter.wrapped_native
    }

    pub fn custody(&self) -> Pubkey {
        self.custody
    }

    pub fn settings(&self) -> SwapSettings {
        self.quoter.settings
    }

    fn ensure_convertible(&self, asset: &Pubkey) -> Result<(), SwapError> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };
        let registry = registry.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if registry.is_supported(asset) && !registry.is_paused(asset) {
            Ok(())
        } else {
            Err(SwapError::AssetNotConvertible(*asset))
        }
    }
}

impl<L: ReserveOracle> SwapHelper<L> {
    /// Full exact-input quote for `amount_in` of `asset`
    pub fn quote(&self, asset: &Pubkey, amount_in: u64) -> Result<SwapQuote, SwapError> {
        self.ensure_convertible(asset)?;
        self.quoter.quote_exact_in(&self.ledger, asset, amount_in)
    }

    /// Settlement units `amount_in` of `asset` would buy right now
    pub fn estimate(&self, asset: &Pubkey, amount_in: u64) -> Result<u64, SwapError> {
        Ok(self.quote(asset, amount_in)?.amount_out)
    }

    /// Full exact-output quote for receiving `settlement_out`
    pub fn quote_settlement(&self, asset: &Pubkey, settlement_out: u64) -> Result<SettlementQuote, SwapError> {
        self.ensure_convertible(asset)?;
        self.quoter.quote_exact_out(&self.ledger, asset, settlement_out)
    }

    /// Units of `asset` the caller must pay to receive exactly `settlement_out`
    pub fn required_input(&self, asset: &Pubkey, settlement_out: u64) -> Result<u64, SwapError> {
        Ok(self.quote_settlement(asset, settlement_out)?.required_input)
    }
}

impl<L: Ledger> SwapHelper<L> {
    /// Sells exactly `amount_in` of `asset` for the caller.
    ///
    /// The caller must have approved the custody account for `amount_in`.
    pub fn swap(&mut self, caller: &Pubkey, asset: &Pubkey, amount_in: u64) -> Result<SwapReceipt, SwapError> {
        self.ensure_convertible(asset)?;
        if amount_in == 0 {
            return Err(SwapError::InvalidInput("amount in must be positive".to_string()));
        }
        let quoter = self.quoter;
        let custody = self.custody;

        let result = self.ledger.atomically(|ledger| {
            ledger.transfer_from(asset, caller, &custody, amount_in)?;

            // reserves may have moved since the caller's own quote
            let quote = quoter.quote_exact_in(&*ledger, asset, amount_in)?;
            let min_amount_out = math::min_amount_out(quote.amount_out, quoter.settings.min_out_tolerance_bps);

            let amount_out = ledger.execute_swap(&quote.route, &custody, amount_in, min_amount_out, &custody)?;
            ledger.transfer(&quoter.settlement, &custody, caller, amount_out)?;

            Ok(SwapReceipt {
                route: quote.route,
                amount_in,
                amount_out,
                min_amount_out,
                retained: 0,
                subsidy: 0,
            })
        });

        log_outcome(caller, &result);
        result
    }

    /// Buys exactly `settlement_out` for the caller, paying with `asset`.
    ///
    /// The caller is charged the quoted `required_input`. When the engine needs
    /// less, the rest stays in helper custody (`retained`); when it needs more,
    /// custody pays the difference (`subsidy`) out of its own float of `asset`.
    pub fn swap_for_exact(
        &mut self,
        caller: &Pubkey,
        asset: &Pubkey,
        settlement_out: u64,
    ) -> Result<SwapReceipt, SwapError> {
        self.ensure_convertible(asset)?;
        let quoter = self.quoter;
        let custody = self.custody;

        let result = self.ledger.atomically(|ledger| {
            let quote = quoter.quote_exact_out(&*ledger, asset, settlement_out)?;

            let float = ledger.balance_of(asset, &custody);
            if float < quote.subsidy {
                return Err(SwapError::InsufficientBalance {
                    required: quote.subsidy,
                    available: float,
                });
            }
            ledger.transfer_from(asset, caller, &custody, quote.required_input)?;

            let max_amount_in = quote.required_input.max(quote.engine_input);
            let spent = ledger.execute_swap_exact_out(
                &quote.route,
                &custody,
                settlement_out,
                max_amount_in,
                caller,
            )?;

            Ok(SwapReceipt {
                route: quote.route,
                amount_in: quote.required_input,
                amount_out: settlement_out,
                min_amount_out: settlement_out,
                retained: quote.required_input.saturating_sub(spent),
                subsidy: spent.saturating_sub(quote.required_input),
            })
        });

        log_outcome(caller, &result);
        result
    }

    /// Wraps `lamports` of the caller's native currency and sells them on the
    /// wrapped-native pool.
    pub fn swap_native(&mut self, caller: &Pubkey, lamports: u64) -> Result<SwapReceipt, SwapError> {
        let wrapped = self.quoter.wrapped_native;
        self.ensure_convertible(&wrapped)?;
        if lamports == 0 {
            return Err(SwapError::InvalidInput("amount in must be positive".to_string()));
        }
        let quoter = self.quoter;
        let custody = self.custody;

        let result = self.ledger.atomically(|ledger| {
            ledger.deposit_native(caller, &custody, lamports)?;

            let quote = quoter.quote_exact_in(&*ledger, &wrapped, lamports)?;
            let min_amount_out = math::min_amount_out(quote.amount_out, quoter.settings.min_out_tolerance_bps);

            let amount_out = ledger.execute_swap(&quote.route, &custody, lamports, min_amount_out, &custody)?;
            ledger.transfer(&quoter.settlement, &custody, caller, amount_out)?;

            Ok(SwapReceipt {
                route: quote.route,
                amount_in: lamports,
                amount_out,
                min_amount_out,
                retained: 0,
                subsidy: 0,
            })
        });

        log_outcome(caller, &result);
        result
    }
}

fn log_outcome(caller: &Pubkey, result: &Result<SwapReceipt, SwapError>) {
    match result {
        Ok(receipt) => info!(
            "Swapped {} -> {} for {} via {}",
            receipt.amount_in, receipt.amount_out, caller, receipt.route
        ),
        Err(e) => warn!("Swap for {} aborted: {}", caller, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::{AssetLedger, NativeWrapper, ReserveOracle};
    use crate::infrastructure::ledger::InMemoryLedger;
    use crate::shared::types::PoolReserves;

    const UNIT: u64 = 1_000_000_000;

    struct Fixture {
        helper: SwapHelper<InMemoryLedger>,
        user: Pubkey,
        token1: Pubkey,
        token2: Pubkey,
        dai: Pubkey,
        weth: Pubkey,
    }

    /// Pools of the reference deployment: TKN1/DAI 1:1, TKN2/DAI 5:1, WETH/DAI 1:2000
    fn setup() -> Fixture {
        let user = Pubkey::new_unique();
        let custody = Pubkey::new_unique();
        let token1 = Pubkey::new_unique();
        let token2 = Pubkey::new_unique();
        let dai = Pubkey::new_unique();
        let weth = Pubkey::new_unique();

        let mut ledger = InMemoryLedger::new(weth, 30);
        ledger.add_pool(token1, dai, 100_000 * UNIT, 100_000 * UNIT).unwrap();
        ledger.add_pool(token2, dai, 500_000 * UNIT, 100_000 * UNIT).unwrap();
        ledger.add_pool(weth, dai, 100 * UNIT, 200_000 * UNIT).unwrap();
        ledger.mint(&token1, &user, 900_000 * UNIT);
        ledger.mint(&token2, &user, 500_000 * UNIT);
        ledger.mint(&dai, &user, 600_000 * UNIT);
        ledger.credit_native(&user, 10 * UNIT);

        let helper = SwapHelper::new(ledger, dai, weth, custody, SwapSettings::default());
        Fixture { helper, user, token1, token2, dai, weth }
    }

    #[test]
    fn test_estimate_is_idempotent() {
        let fx = setup();
        let first = fx.helper.estimate(&fx.token1, 150 * UNIT).unwrap();
        let second = fx.helper.estimate(&fx.token1, 150 * UNIT).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 149_326_681_947);
    }

    #[test]
    fn test_estimate_price_impact_is_nonlinear() {
        let fx = setup();
        assert!(matches!(
            fx.helper.estimate(&fx.token1, 5_000 * UNIT),
            Err(SwapError::SlippageExceeded { .. })
        ));
        let small = fx.helper.estimate(&fx.token1, 150 * UNIT).unwrap();
        let large = fx.helper.estimate(&fx.token1, 1_500 * UNIT).unwrap();
        assert!(large > small);
        assert!(large < small * 10);
    }

    #[test]
    fn test_required_input_for_wrapped_native() {
        let fx = setup();
        assert_eq!(fx.helper.required_input(&fx.weth, 1_500 * UNIT).unwrap(), 755_250_000);
        assert_eq!(fx.helper.required_input(&fx.weth, 150 * UNIT).unwrap(), 75_375_000);
        assert_eq!(fx.helper.required_input(&fx.weth, 150_000_000).unwrap(), 75_375);
        assert!(matches!(
            fx.helper.required_input(&fx.weth, 5_000 * UNIT),
            Err(SwapError::SlippageExceeded { .. })
        ));
    }

    #[test]
    fn test_swap_moves_reserves() {
        let mut fx = setup();
        let custody = fx.helper.custody();
        fx.helper.ledger_mut().approve(&fx.token1, &fx.user, &custody, u64::MAX);

        let before = fx.helper.estimate(&fx.token1, 10 * UNIT).unwrap();
        let receipt = fx.helper.swap(&fx.user, &fx.token1, 10 * UNIT).unwrap();
        assert_eq!(receipt.amount_out, before);
        assert!(receipt.min_amount_out <= receipt.amount_out);

        let after = fx.helper.estimate(&fx.token1, 10 * UNIT).unwrap();
        assert!(after < before);

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.balance_of(&fx.token1, &fx.user), 900_000 * UNIT - 10 * UNIT);
        assert_eq!(ledger.balance_of(&fx.dai, &fx.user), 600_000 * UNIT + before);
        assert_eq!(ledger.balance_of(&fx.token1, &custody), 0);
        assert_eq!(ledger.balance_of(&fx.dai, &custody), 0);
    }

    #[test]
    fn test_swap_requires_authorization() {
        let mut fx = setup();
        let err = fx.helper.swap(&fx.user, &fx.token1, 10 * UNIT).unwrap_err();
        assert_eq!(err, SwapError::TransferAuthorizationMissing { required: 10 * UNIT, approved: 0 });
        assert_eq!(fx.helper.ledger().balance_of(&fx.token1, &fx.user), 900_000 * UNIT);
    }

    #[test]
    fn test_rejected_swap_leaves_no_trace() {
        let mut fx = setup();
        let custody = fx.helper.custody();
        fx.helper.ledger_mut().approve(&fx.token1, &fx.user, &custody, u64::MAX);

        let err = fx.helper.swap(&fx.user, &fx.token1, 5_000 * UNIT).unwrap_err();
        assert!(matches!(err, SwapError::SlippageExceeded { .. }));

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.balance_of(&fx.token1, &fx.user), 900_000 * UNIT);
        assert_eq!(ledger.allowance(&fx.token1, &fx.user, &custody), u64::MAX);
        assert_eq!(ledger.balance_of(&fx.token1, &custody), 0);
    }

    #[test]
    fn test_swap_for_exact_settlement() {
        let mut fx = setup();
        let custody = fx.helper.custody();
        fx.helper.ledger_mut().approve(&fx.token2, &fx.user, &custody, u64::MAX);

        let receipt = fx.helper.swap_for_exact(&fx.user, &fx.token2, 10 * UNIT).unwrap();
        assert_eq!(receipt.amount_in, 50_250_000_000);
        assert_eq!(receipt.amount_out, 10 * UNIT);
        assert!(receipt.retained > 0);

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.balance_of(&fx.token2, &fx.user), 499_949_750_000_000);
        assert_eq!(ledger.balance_of(&fx.dai, &fx.user), 600_010 * UNIT);
        assert_eq!(ledger.balance_of(&fx.token2, &custody), receipt.retained);
        assert_eq!(receipt.subsidy, 0);
    }

    #[test]
    fn test_swap_for_exact_larger_orders_draw_on_custody_float() {
        let mut fx = setup();
        let custody = fx.helper.custody();
        let ledger = fx.helper.ledger_mut();
        ledger.approve(&fx.token1, &fx.user, &custody, u64::MAX);
        ledger.mint(&fx.token1, &custody, 10 * UNIT);

        let mid = fx.helper.swap_for_exact(&fx.user, &fx.token1, 150 * UNIT).unwrap();
        assert_eq!(mid.amount_in, 150_150_000_000);
        assert_eq!(mid.retained, 0);
        assert_eq!(mid.subsidy, 527_370_118);

        let quoted = fx.helper.quote_settlement(&fx.token1, 1_500 * UNIT).unwrap();
        let large = fx.helper.swap_for_exact(&fx.user, &fx.token1, 1_500 * UNIT).unwrap();
        assert_eq!(large.amount_in, quoted.required_input);
        assert_eq!(large.subsidy, quoted.subsidy);

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.balance_of(&fx.dai, &fx.user), 600_000 * UNIT + 1_650 * UNIT);
        assert_eq!(
            ledger.balance_of(&fx.token1, &fx.user),
            900_000 * UNIT - 150_150_000_000 - quoted.required_input
        );
        assert_eq!(
            ledger.balance_of(&fx.token1, &custody),
            10 * UNIT - mid.subsidy - large.subsidy
        );
    }

    #[test]
    fn test_swap_for_exact_without_float_fails_cleanly() {
        let mut fx = setup();
        let custody = fx.helper.custody();
        fx.helper.ledger_mut().approve(&fx.token1, &fx.user, &custody, u64::MAX);

        let err = fx.helper.swap_for_exact(&fx.user, &fx.token1, 150 * UNIT).unwrap_err();
        assert_eq!(err, SwapError::InsufficientBalance { required: 527_370_118, available: 0 });

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.balance_of(&fx.token1, &fx.user), 900_000 * UNIT);
        assert_eq!(ledger.balance_of(&fx.dai, &fx.user), 600_000 * UNIT);
        assert_eq!(ledger.allowance(&fx.token1, &fx.user, &custody), u64::MAX);
    }

    #[test]
    fn test_engine_shortfall_rolls_back_swap() {
        let user = Pubkey::new_unique();
        let custody = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let dai = Pubkey::new_unique();

        // the pool charges 1% while the helper quotes with 0.3%
        let mut ledger = InMemoryLedger::new(Pubkey::new_unique(), 30);
        ledger.add_pool_with_fee(token, dai, 100_000 * UNIT, 100_000 * UNIT, 100).unwrap();
        ledger.mint(&token, &user, 1_000 * UNIT);
        ledger.approve(&token, &user, &custody, 500 * UNIT);
        let mut helper = SwapHelper::new(ledger, dai, Pubkey::new_unique(), custody, SwapSettings::default());

        let err = helper.swap(&user, &token, 100 * UNIT).unwrap_err();
        assert!(matches!(err, SwapError::ExecutionFailed(_)));

        let ledger = helper.ledger();
        assert_eq!(ledger.balance_of(&token, &user), 1_000 * UNIT);
        assert_eq!(ledger.balance_of(&dai, &user), 0);
        assert_eq!(ledger.balance_of(&token, &custody), 0);
        assert_eq!(ledger.allowance(&token, &user, &custody), 500 * UNIT);
        assert_eq!(
            ledger.get_reserves(&token, &dai).unwrap(),
            Some(PoolReserves::new(100_000 * UNIT, 100_000 * UNIT))
        );
    }

    #[test]
    fn test_estimate_reads_fresh_reserves() {
        let mut fx = setup();
        let before = fx.helper.estimate(&fx.token1, 150 * UNIT).unwrap();

        // another trader drains half the settlement side
        fx.helper
            .ledger_mut()
            .set_reserves(&fx.token1, &fx.dai, 100_000 * UNIT, 50_000 * UNIT)
            .unwrap();
        let after = fx.helper.estimate(&fx.token1, 150 * UNIT).unwrap();
        assert_eq!(after, math::get_amount_out(150 * UNIT, 100_000 * UNIT, 50_000 * UNIT, 30).unwrap());
        assert!(after < before);
    }

    #[test]
    fn test_swap_native_wraps_first() {
        let mut fx = setup();
        let receipt = fx.helper.swap_native(&fx.user, UNIT).unwrap();
        assert_eq!(receipt.route.as_str(), "wrapped-native");

        let ledger = fx.helper.ledger();
        assert_eq!(ledger.native_balance(&fx.user), 9 * UNIT);
        assert_eq!(ledger.balance_of(&fx.dai, &fx.user), 600_000 * UNIT + receipt.amount_out);
    }

    #[test]
    fn test_registry_gate() {
        let fx = setup();
        let registry = Arc::new(RwLock::new(TokenRegistry::new()));
        registry.write().unwrap().add_token(fx.token1).unwrap();
        let helper = fx.helper.with_registry(registry.clone());

        assert!(helper.estimate(&fx.token1, UNIT).is_ok());
        assert_eq!(
            helper.estimate(&fx.token2, UNIT).unwrap_err(),
            SwapError::AssetNotConvertible(fx.token2)
        );

        registry.write().unwrap().pause_token(&fx.token1).unwrap();
        assert_eq!(
            helper.estimate(&fx.token1, UNIT).unwrap_err(),
            SwapError::AssetNotConvertible(fx.token1)
        );
    }
}
