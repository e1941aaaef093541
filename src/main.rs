mod app;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use tracing_subscriber::EnvFilter;

use crate::config::parse_pubkey;

#[derive(Parser, Debug)]
#[command(version, about = "Settlement swap helper and token registry for constant-product pools")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// RPC endpoint URL (overrides config)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Settlement asset mint (overrides config)
    #[arg(long)]
    settlement: Option<String>,

    /// Largest accepted price impact in basis points (overrides config)
    #[arg(long)]
    max_price_impact_bps: Option<u64>,

    /// Only convert assets that are active in the registry
    #[arg(long)]
    enforce_registry: bool,

    /// Quote from configured reserves even when an RPC endpoint is set
    #[arg(long)]
    simulate_only: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Settlement output for selling an exact amount of an asset
    Estimate {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        amount: u64,
    },
    /// Input needed to receive an exact settlement amount
    Required {
        #[arg(long)]
        asset: String,
        /// Settlement amount wanted
        #[arg(long)]
        amount: u64,
    },
    /// Execute a swap on the simulated pools
    SimulateSwap {
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        amount: u64,
        /// Treat the amount as the settlement output wanted
        #[arg(long)]
        exact_out: bool,
        /// Sell native currency through the wrapped-native pool
        #[arg(long)]
        native: bool,
    },
    /// Re-quote on an interval and log changes
    Watch {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "5")]
        interval_secs: u64,
        /// Stop after this many quotes
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Manage the token registry
    #[command(subcommand)]
    Registry(RegistryCmd),
}

#[derive(Subcommand, Debug)]
enum RegistryCmd {
    Add { asset: String },
    Pause { asset: String },
    Resume { asset: String },
    Status { asset: String },
    List,
}

fn asset(value: &str) -> Result<Pubkey> {
    parse_pubkey("asset", value)
}

fn to_command(cmd: Cmd) -> Result<app::Command> {
    use app::{Command, RegistryCommand};

    Ok(match cmd {
        Cmd::Estimate { asset: a, amount } => Command::Estimate { asset: asset(&a)?, amount },
        Cmd::Required { asset: a, amount } => Command::Required { asset: asset(&a)?, amount },
        Cmd::SimulateSwap {
            asset: a,
            amount,
            exact_out,
            native,
        } => Command::SimulateSwap {
            asset: a.as_deref().map(asset).transpose()?,
            amount,
            exact_out,
            native,
        },
        Cmd::Watch {
            asset: a,
            amount,
            interval_secs,
            iterations,
        } => Command::Watch {
            asset: asset(&a)?,
            amount,
            interval_secs,
            iterations,
        },
        Cmd::Registry(cmd) => Command::Registry(match cmd {
            RegistryCmd::Add { asset: a } => RegistryCommand::Add(asset(&a)?),
            RegistryCmd::Pause { asset: a } => RegistryCommand::Pause(asset(&a)?),
            RegistryCmd::Resume { asset: a } => RegistryCommand::Resume(asset(&a)?),
            RegistryCmd::Status { asset: a } => RegistryCommand::Status(asset(&a)?),
            RegistryCmd::List => RegistryCommand::List,
        }),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let base_config = config::Config::from_file(&args.config)?;
    let mut app_cfg = app::AppCfg::from_config(base_config)?;

    // CLI args take priority over the config file
    if let Some(rpc_url) = args.rpc_url {
        app_cfg.rpc_url = Some(rpc_url);
    }
    if let Some(settlement) = args.settlement {
        app_cfg.settlement = parse_pubkey("--settlement", &settlement)?;
    }
    if let Some(max_bps) = args.max_price_impact_bps {
        app_cfg.settings.max_price_impact_bps = max_bps;
    }
    if args.enforce_registry {
        app_cfg.enforce_registry = true;
    }
    app_cfg.simulate_only = args.simulate_only;
    app_cfg.json = args.json;

    app::run(app_cfg, to_command(args.command)?).await
}
