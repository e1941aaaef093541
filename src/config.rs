use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr};

use tokenswap::domain::swap::SwapSettings;
use tokenswap::infrastructure::blockchain::PoolVaults;
use tokenswap::shared::types::native_mint;

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsCfg {
    pub settlement: String,
    /// Defaults to the SPL native mint
    pub wrapped_native: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapCfg {
    pub fee_bps: u32,
    pub max_price_impact_bps: u64,
    pub min_out_tolerance_bps: u32,
    pub enforce_registry: bool,
}

impl Default for SwapCfg {
    fn default() -> Self {
        let settings = SwapSettings::default();
        Self {
            fee_bps: settings.fee_bps,
            max_price_impact_bps: settings.max_price_impact_bps,
            min_out_tolerance_bps: settings.min_out_tolerance_bps,
            enforce_registry: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcCfg {
    pub url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolCfg {
    pub mint_a: String,
    pub mint_b: String,
    pub vault_a: Option<String>,
    pub vault_b: Option<String>,
    pub reserve_a: Option<u64>,
    pub reserve_b: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryCfg {
    pub state_path: Option<String>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub assets: AssetsCfg,
    #[serde(default)]
    pub swap: SwapCfg,
    pub rpc: Option<RpcCfg>,
    #[serde(default)]
    pub pools: Vec<PoolCfg>,
    #[serde(default)]
    pub registry: RegistryCfg,
}

/// Pool as the app uses it, with every key parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSetup {
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub vaults: Option<(Pubkey, Pubkey)>,
    pub reserves: Option<(u64, u64)>,
}

pub fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("invalid {}: {}", field, value))
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse Config.toml")?;
        Ok(cfg)
    }

    pub fn settlement(&self) -> Result<Pubkey> {
        parse_pubkey("assets.settlement", &self.assets.settlement)
    }

    pub fn wrapped_native(&self) -> Result<Pubkey> {
        match &self.assets.wrapped_native {
            Some(mint) => parse_pubkey("assets.wrapped_native", mint),
            None => Ok(native_mint()),
        }
    }

    pub fn swap_settings(&self) -> SwapSettings {
        SwapSettings {
            fee_bps: self.swap.fee_bps,
            max_price_impact_bps: self.swap.max_price_impact_bps,
            min_out_tolerance_bps: self.swap.min_out_tolerance_bps,
        }
    }

    pub fn pool_setups(&self) -> Result<Vec<PoolSetup>> {
        self.pools
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                let mint_a = parse_pubkey(&format!("pools[{}].mint_a", i), &pool.mint_a)?;
                let mint_b = parse_pubkey(&format!("pools[{}].mint_b", i), &pool.mint_b)?;
                let vaults = match (&pool.vault_a, &pool.vault_b) {
                    (Some(a), Some(b)) => Some((
                        parse_pubkey(&format!("pools[{}].vault_a", i), a)?,
                        parse_pubkey(&format!("pools[{}].vault_b", i), b)?,
                    )),
                    (None, None) => None,
                    _ => return Err(anyhow!("pools[{}] needs both vault_a and vault_b", i)),
                };
                let reserves = match (pool.reserve_a, pool.reserve_b) {
                    (Some(a), Some(b)) => Some((a, b)),
                    (None, None) => None,
                    _ => return Err(anyhow!("pools[{}] needs both reserve_a and reserve_b", i)),
                };
                Ok(PoolSetup {
                    mint_a,
                    mint_b,
                    vaults,
                    reserves,
                })
            })
            .collect()
    }

    pub fn registry_tokens(&self) -> Result<Vec<Pubkey>> {
        self.registry
            .tokens
            .iter()
            .map(|token| parse_pubkey("registry.tokens", token))
            .collect()
    }
}

impl PoolSetup {
    pub fn vaults(&self) -> Option<PoolVaults> {
        self.vaults.map(|(vault_a, vault_b)| PoolVaults {
            mint_a: self.mint_a,
            mint_b: self.mint_b,
            vault_a,
            vault_b,
        })
    }
}
