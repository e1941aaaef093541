// src/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use tokenswap::domain::exchange::{AssetLedger, ReserveOracle};
use tokenswap::domain::registry::{RegistryEntry, TokenRegistry};
use tokenswap::domain::swap::{SettlementQuote, SwapHelper, SwapQuote, SwapReceipt, SwapSettings};
use tokenswap::infrastructure::blockchain::VaultReserveOracle;
use tokenswap::infrastructure::ledger::InMemoryLedger;
use tokenswap::shared::errors::SwapError;
use tokenswap::shared::types::{pubkey_string, PoolReserves};

use crate::config::{Config, PoolSetup};

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub settlement: Pubkey,
    pub wrapped_native: Pubkey,
    pub settings: SwapSettings,
    pub enforce_registry: bool,
    pub rpc_url: Option<String>,
    pub commitment: String,
    pub pools: Vec<PoolSetup>,
    pub registry_path: Option<PathBuf>,
    pub registry_seed: Vec<Pubkey>,
    /// Quote from the configured reserves even when an RPC endpoint is set
    pub simulate_only: bool,
    pub json: bool,
}

impl AppCfg {
    pub fn from_config(cfg: Config) -> Result<Self> {
        let (rpc_url, commitment) = match &cfg.rpc {
            Some(rpc) => (Some(rpc.url.clone()), rpc.commitment.clone()),
            None => (None, "confirmed".to_string()),
        };

        Ok(Self {
            settlement: cfg.settlement()?,
            wrapped_native: cfg.wrapped_native()?,
            settings: cfg.swap_settings(),
            enforce_registry: cfg.swap.enforce_registry,
            rpc_url,
            commitment,
            pools: cfg.pool_setups()?,
            registry_path: cfg.registry.state_path.as_ref().map(PathBuf::from),
            registry_seed: cfg.registry_tokens()?,
            simulate_only: false,
            json: false,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Estimate { asset: Pubkey, amount: u64 },
    Required { asset: Pubkey, amount: u64 },
    SimulateSwap {
        asset: Option<Pubkey>,
        amount: u64,
        exact_out: bool,
        native: bool,
    },
    Watch {
        asset: Pubkey,
        amount: u64,
        interval_secs: u64,
        iterations: Option<u64>,
    },
    Registry(RegistryCommand),
}

#[derive(Debug, Clone)]
pub enum RegistryCommand {
    Add(Pubkey),
    Pause(Pubkey),
    Resume(Pubkey),
    Status(Pubkey),
    List,
}

/// Where quotes read their reserves from
pub enum ReserveSource {
    Rpc(VaultReserveOracle),
    Simulated(InMemoryLedger),
}

impl ReserveOracle for ReserveSource {
    fn get_reserves(&self, asset_a: &Pubkey, asset_b: &Pubkey) -> Result<Option<PoolReserves>, SwapError> {
        match self {
            ReserveSource::Rpc(oracle) => oracle.get_reserves(asset_a, asset_b),
            ReserveSource::Simulated(ledger) => ledger.get_reserves(asset_a, asset_b),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub receipt: SwapReceipt,
    #[serde(with = "pubkey_string")]
    pub caller: Pubkey,
    pub caller_settlement: u64,
    pub custody_retained: u64,
    pub reserves_after: PoolReserves,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    #[serde(with = "pubkey_string")]
    pub asset: Pubkey,
    pub supported: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RegistryOutput {
    Status(TokenStatus),
    Entries(Vec<RegistryEntry>),
}

/// In-memory ledger holding every pool with configured reserves
pub fn seed_ledger(cfg: &AppCfg) -> Result<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new(cfg.wrapped_native, cfg.settings.fee_bps);
    let mut seeded = 0;
    for pool in &cfg.pools {
        if let Some((reserve_a, reserve_b)) = pool.reserves {
            ledger
                .add_pool(pool.mint_a, pool.mint_b, reserve_a, reserve_b)
                .with_context(|| format!("seed pool {} / {}", pool.mint_a, pool.mint_b))?;
            seeded += 1;
        }
    }
    if seeded == 0 {
        bail!("no pool has reserve_a/reserve_b configured");
    }
    debug!("Seeded {} simulated pools", seeded);
    Ok(ledger)
}

pub fn reserve_source(cfg: &AppCfg) -> Result<ReserveSource> {
    let vaults: Vec<_> = cfg.pools.iter().filter_map(PoolSetup::vaults).collect();
    match &cfg.rpc_url {
        Some(url) if !cfg.simulate_only && !vaults.is_empty() => {
            info!("Reading reserves of {} pools from {}", vaults.len(), url);
            Ok(ReserveSource::Rpc(VaultReserveOracle::from_rpc_url(url, &cfg.commitment, vaults)?))
        }
        _ => {
            info!("Using simulated reserves from the configuration");
            Ok(ReserveSource::Simulated(seed_ledger(cfg)?))
        }
    }
}

pub fn load_registry(cfg: &AppCfg) -> Result<TokenRegistry> {
    let mut registry = match &cfg.registry_path {
        Some(path) => TokenRegistry::load(path)?,
        None => TokenRegistry::new(),
    };
    if registry.is_empty() {
        for token in &cfg.registry_seed {
            registry.add_token(*token)?;
        }
    }
    Ok(registry)
}

fn save_registry(cfg: &AppCfg, registry: &TokenRegistry) -> Result<()> {
    match &cfg.registry_path {
        Some(path) => {
            registry.save(path)?;
            debug!("Registry saved to {}", path.display());
        }
        None => warn!("registry.state_path is not set, changes are not persisted"),
    }
    Ok(())
}

fn build_helper<L>(cfg: &AppCfg, ledger: L, custody: Pubkey) -> Result<SwapHelper<L>> {
    let helper = SwapHelper::new(ledger, cfg.settlement, cfg.wrapped_native, custody, cfg.settings);
    if cfg.enforce_registry {
        let registry = load_registry(cfg)?;
        Ok(helper.with_registry(Arc::new(RwLock::new(registry))))
    } else {
        Ok(helper)
    }
}

pub fn estimate(cfg: &AppCfg, asset: &Pubkey, amount: u64) -> Result<SwapQuote> {
    let helper = build_helper(cfg, reserve_source(cfg)?, Pubkey::default())?;
    let quote = helper
        .quote(asset, amount)
        .with_context(|| format!("estimate {} of {}", amount, asset))?;
    Ok(quote)
}

pub fn required(cfg: &AppCfg, asset: &Pubkey, amount: u64) -> Result<SettlementQuote> {
    let helper = build_helper(cfg, reserve_source(cfg)?, Pubkey::default())?;
    let quote = helper
        .quote_settlement(asset, amount)
        .with_context(|| format!("required input of {} for {} settlement", asset, amount))?;
    Ok(quote)
}

/// Runs one swap against the simulated pools for a freshly funded caller
pub fn simulate_swap(cfg: &AppCfg, asset: Option<Pubkey>, amount: u64, exact_out: bool, native: bool) -> Result<SimulationReport> {
    let custody = Pubkey::new_unique();
    let caller = Pubkey::new_unique();
    let mut helper = build_helper(cfg, seed_ledger(cfg)?, custody)?;

    let receipt = if native {
        if exact_out {
            bail!("--native only sells an exact native amount");
        }
        helper.ledger_mut().credit_native(&caller, amount);
        helper.swap_native(&caller, amount)?
    } else {
        let asset = asset.ok_or_else(|| anyhow!("--asset is required unless --native is set"))?;
        let (funding, float) = if exact_out {
            let quote = helper.quote_settlement(&asset, amount)?;
            (quote.required_input, quote.subsidy)
        } else {
            (amount, 0)
        };
        let ledger = helper.ledger_mut();
        if float > 0 {
            info!("Funding custody with a float of {} to cover the engine price", float);
            ledger.mint(&asset, &custody, float);
        }
        ledger.mint(&asset, &caller, funding);
        ledger.approve(&asset, &caller, &custody, funding);
        if exact_out {
            helper.swap_for_exact(&caller, &asset, amount)?
        } else {
            helper.swap(&caller, &asset, amount)?
        }
    };

    let route = receipt.route;
    let ledger = helper.ledger();
    let reserves_after = ledger
        .get_reserves(&route.asset_in(), &route.asset_out())?
        .ok_or_else(|| anyhow!("pool for {} disappeared", route))?;

    Ok(SimulationReport {
        caller_settlement: ledger.balance_of(&cfg.settlement, &caller),
        custody_retained: ledger.balance_of(&route.asset_in(), &custody),
        receipt,
        caller,
        reserves_after,
    })
}

pub fn apply_registry(cfg: &AppCfg, command: &RegistryCommand) -> Result<RegistryOutput> {
    let mut registry = load_registry(cfg)?;
    let mut events = registry.subscribe();

    let changed = match command {
        RegistryCommand::Add(asset) => {
            registry.add_token(*asset)?;
            Some(*asset)
        }
        RegistryCommand::Pause(asset) => {
            registry.pause_token(asset)?;
            Some(*asset)
        }
        RegistryCommand::Resume(asset) => {
            registry.resume_token(asset)?;
            Some(*asset)
        }
        RegistryCommand::Status(asset) => Some(*asset),
        RegistryCommand::List => None,
    };

    while let Ok(notification) = events.try_recv() {
        info!("{:?} at {}", notification.event, notification.at);
    }
    if !matches!(command, RegistryCommand::Status(_) | RegistryCommand::List) {
        save_registry(cfg, &registry)?;
    }

    Ok(match changed {
        Some(asset) => RegistryOutput::Status(TokenStatus {
            asset,
            supported: registry.is_supported(&asset),
            paused: registry.is_paused(&asset),
        }),
        None => RegistryOutput::Entries(registry.entries().to_vec()),
    })
}

fn emit<T: Serialize>(cfg: &AppCfg, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
    if cfg.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

pub async fn run(app_cfg: AppCfg, command: Command) -> Result<()> {
    debug!("Configuration: {:?}", app_cfg);

    match command {
        Command::Estimate { asset, amount } => {
            let quote = tokio::task::block_in_place(|| estimate(&app_cfg, &asset, amount))?;
            emit(&app_cfg, &quote, |q| {
                format!(
                    "{} of {} -> {} settlement via {} (impact {} bps)",
                    q.amount_in, asset, q.amount_out, q.route.as_str(), q.price_impact_bps
                )
            })
        }
        Command::Required { asset, amount } => {
            let quote = tokio::task::block_in_place(|| required(&app_cfg, &asset, amount))?;
            emit(&app_cfg, &quote, |q| {
                format!(
                    "{} settlement costs {} of {} via {} (premium {}‰)",
                    q.settlement_out, q.required_input, asset, q.route.as_str(), q.premium_permille
                )
            })
        }
        Command::SimulateSwap {
            asset,
            amount,
            exact_out,
            native,
        } => {
            let report = simulate_swap(&app_cfg, asset, amount, exact_out, native)?;
            emit(&app_cfg, &report, |r| {
                format!(
                    "Paid {} via {}, received {} settlement (retained {}); pool now {} / {}",
                    r.receipt.amount_in,
                    r.receipt.route,
                    r.caller_settlement,
                    r.custody_retained,
                    r.reserves_after.reserve_in,
                    r.reserves_after.reserve_out
                )
            })
        }
        Command::Watch {
            asset,
            amount,
            interval_secs,
            iterations,
        } => run_polling_mode(app_cfg, asset, amount, interval_secs, iterations).await,
        Command::Registry(command) => {
            let output = apply_registry(&app_cfg, &command)?;
            emit(&app_cfg, &output, |o| match o {
                RegistryOutput::Status(s) => format!(
                    "{}: {}",
                    s.asset,
                    match (s.supported, s.paused) {
                        (false, _) => "not supported",
                        (true, true) => "paused",
                        (true, false) => "active",
                    }
                ),
                RegistryOutput::Entries(entries) if entries.is_empty() => "registry is empty".to_string(),
                RegistryOutput::Entries(entries) => entries
                    .iter()
                    .map(|e| format!("{} {}", e.asset, if e.active { "active" } else { "paused" }))
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
        }
    }
}

async fn run_polling_mode(
    app_cfg: AppCfg,
    asset: Pubkey,
    amount: u64,
    interval_secs: u64,
    iterations: Option<u64>,
) -> Result<()> {
    info!("Watching {} of {} every {}s", amount, asset, interval_secs);

    let helper = build_helper(&app_cfg, reserve_source(&app_cfg)?, Pubkey::default())?;
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
    let mut last: Option<u64> = None;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                break;
            }
        }

        match tokio::task::block_in_place(|| helper.quote(&asset, amount)) {
            Ok(quote) => {
                if last != Some(quote.amount_out) {
                    info!(
                        "{} -> {} settlement (impact {} bps)",
                        amount, quote.amount_out, quote.price_impact_bps
                    );
                    if app_cfg.json {
                        println!("{}", serde_json::to_string(&quote)?);
                    }
                }
                last = Some(quote.amount_out);
            }
            Err(e) => {
                warn!("Quote failed: {}", e);
                last = None;
            }
        }

        ticks += 1;
        if iterations.is_some_and(|n| ticks >= n) {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenswap::shared::types::native_mint;

    const UNIT: u64 = 1_000_000_000;

    struct Fixture {
        cfg: AppCfg,
        token: Pubkey,
        settlement: Pubkey,
    }

    fn setup() -> Fixture {
        let token = Pubkey::new_unique();
        let settlement = Pubkey::new_unique();
        let cfg = AppCfg {
            settlement,
            wrapped_native: native_mint(),
            settings: SwapSettings::default(),
            enforce_registry: false,
            rpc_url: None,
            commitment: "confirmed".to_string(),
            pools: vec![
                PoolSetup {
                    mint_a: token,
                    mint_b: settlement,
                    vaults: None,
                    reserves: Some((100_000 * UNIT, 100_000 * UNIT)),
                },
                PoolSetup {
                    mint_a: settlement,
                    mint_b: native_mint(),
                    vaults: None,
                    reserves: Some((200_000 * UNIT, 100 * UNIT)),
                },
            ],
            registry_path: None,
            registry_seed: Vec::new(),
            simulate_only: false,
            json: false,
        };
        Fixture { cfg, token, settlement }
    }

    #[test]
    fn test_estimate_from_configured_reserves() {
        let fx = setup();
        let quote = estimate(&fx.cfg, &fx.token, 150 * UNIT).unwrap();
        assert_eq!(quote.amount_out, 149_326_681_947);
        assert!(estimate(&fx.cfg, &fx.token, 5_000 * UNIT).is_err());
    }

    #[test]
    fn test_required_from_configured_reserves() {
        let fx = setup();
        let quote = required(&fx.cfg, &fx.token, 10 * UNIT).unwrap();
        assert_eq!(quote.required_input, 10_050_000_000);
        let weth = required(&fx.cfg, &native_mint(), 10 * UNIT).unwrap();
        assert_eq!(weth.required_input, 5_025_000);
    }

    #[test]
    fn test_rpc_without_vaults_falls_back_to_simulation() {
        let mut fx = setup();
        fx.cfg.rpc_url = Some("http://127.0.0.1:1".to_string());
        assert!(matches!(reserve_source(&fx.cfg).unwrap(), ReserveSource::Simulated(_)));
    }

    #[test]
    fn test_seed_ledger_needs_reserves() {
        let mut fx = setup();
        for pool in &mut fx.cfg.pools {
            pool.reserves = None;
        }
        assert!(seed_ledger(&fx.cfg).is_err());
    }

    #[test]
    fn test_simulate_exact_in_swap() {
        let fx = setup();
        let report = simulate_swap(&fx.cfg, Some(fx.token), 150 * UNIT, false, false).unwrap();
        assert_eq!(report.caller_settlement, 149_326_681_947);
        assert_eq!(report.custody_retained, 0);
        assert_eq!(
            report.reserves_after,
            PoolReserves::new(100_150 * UNIT, 100_000 * UNIT - 149_326_681_947)
        );
    }

    #[test]
    fn test_simulate_exact_out_retains_premium() {
        let fx = setup();
        let report = simulate_swap(&fx.cfg, Some(fx.token), 10 * UNIT, true, false).unwrap();
        assert_eq!(report.caller_settlement, 10 * UNIT);
        assert_eq!(report.receipt.amount_in, 10_050_000_000);
        assert_eq!(report.custody_retained, report.receipt.retained);
        assert!(report.custody_retained > 0);
    }

    #[test]
    fn test_simulate_large_exact_out_is_filled() {
        let fx = setup();
        let report = simulate_swap(&fx.cfg, Some(fx.token), 1_500 * UNIT, true, false).unwrap();
        assert_eq!(report.caller_settlement, 1_500 * UNIT);
        assert_eq!(report.receipt.amount_in, 1_522_500_000_000);
        assert_eq!(report.receipt.subsidy, 4_924_914_337);
        assert_eq!(report.custody_retained, 0);
    }

    #[test]
    fn test_simulate_native_swap() {
        let fx = setup();
        let report = simulate_swap(&fx.cfg, None, UNIT / 10, false, true).unwrap();
        assert_eq!(report.receipt.route.asset_in(), native_mint());
        assert_eq!(report.receipt.route.asset_out(), fx.settlement);
        assert!(report.caller_settlement > 0);

        assert!(simulate_swap(&fx.cfg, None, UNIT, true, true).is_err());
        assert!(simulate_swap(&fx.cfg, None, UNIT, false, false).is_err());
    }

    #[test]
    fn test_registry_commands_persist() {
        let mut fx = setup();
        let dir = tempfile::tempdir().unwrap();
        fx.cfg.registry_path = Some(dir.path().join("registry.json"));

        apply_registry(&fx.cfg, &RegistryCommand::Add(fx.token)).unwrap();
        apply_registry(&fx.cfg, &RegistryCommand::Pause(fx.token)).unwrap();

        match apply_registry(&fx.cfg, &RegistryCommand::Status(fx.token)).unwrap() {
            RegistryOutput::Status(status) => {
                assert!(status.supported);
                assert!(status.paused);
            }
            other => panic!("unexpected output {:?}", other),
        }
        match apply_registry(&fx.cfg, &RegistryCommand::List).unwrap() {
            RegistryOutput::Entries(entries) => {
                assert_eq!(entries, vec![RegistryEntry { asset: fx.token, active: false }]);
            }
            other => panic!("unexpected output {:?}", other),
        }
        assert!(apply_registry(&fx.cfg, &RegistryCommand::Add(fx.token)).is_err());
    }

    #[test]
    fn test_enforced_registry_blocks_unlisted_assets() {
        let mut fx = setup();
        fx.cfg.enforce_registry = true;
        assert!(estimate(&fx.cfg, &fx.token, UNIT).is_err());

        fx.cfg.registry_seed = vec![fx.token];
        assert!(estimate(&fx.cfg, &fx.token, UNIT).is_ok());
    }
}
