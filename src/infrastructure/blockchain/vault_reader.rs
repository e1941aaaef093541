//! Vault balance reader for live pool reserves

use std::str::FromStr;

use solana_client::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Account as TokenAccount;
use tracing::{debug, warn};

use crate::domain::exchange::ReserveOracle;
use crate::shared::errors::SwapError;
use crate::shared::types::PoolReserves;

/// Reads SPL token account balances over JSON-RPC
pub struct VaultReader {
    rpc_client: RpcClient,
}

impl VaultReader {
    pub fn with_commitment(rpc_url: String, commitment: CommitmentConfig) -> Self {
        Self {
            rpc_client: RpcClient::new_with_commitment(rpc_url, commitment),
        }
    }

    pub fn get_token_account_balance(&self, token_account: &Pubkey) -> Result<u64, SwapError> {
        let account = self
            .rpc_client
            .get_account(token_account)
            .map_err(|e| SwapError::Oracle(format!("Failed to get token account {}: {}", token_account, e)))?;

        let data = TokenAccount::unpack(&account.data)
            .map_err(|e| SwapError::Oracle(format!("Failed to parse token account {}: {}", token_account, e)))?;

        Ok(data.amount)
    }

    pub fn get_pool_vault_balances(&self, vault_a: &Pubkey, vault_b: &Pubkey) -> Result<(u64, u64), SwapError> {
        let balance_a = self.get_token_account_balance(vault_a)?;
        let balance_b = self.get_token_account_balance(vault_b)?;
        Ok((balance_a, balance_b))
    }
}

/// Pool whose reserves live in two token vaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolVaults {
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub vault_a: Pubkey,
    pub vault_b: Pubkey,
}

impl PoolVaults {
    /// Vaults ordered as (`asset_in`, `asset_out`), if this pool trades the pair
    fn oriented(&self, asset_in: &Pubkey, asset_out: &Pubkey) -> Option<(Pubkey, Pubkey)> {
        if self.mint_a == *asset_in && self.mint_b == *asset_out {
            Some((self.vault_a, self.vault_b))
        } else if self.mint_b == *asset_in && self.mint_a == *asset_out {
            Some((self.vault_b, self.vault_a))
        } else {
            None
        }
    }
}

/// Read-only reserve oracle backed by live vault balances.
///
/// Only pools listed at construction are known; anything else reports no pool.
pub struct VaultReserveOracle {
    reader: VaultReader,
    pools: Vec<PoolVaults>,
}

impl VaultReserveOracle {
    pub fn new(reader: VaultReader, pools: Vec<PoolVaults>) -> Self {
        Self { reader, pools }
    }

    pub fn from_rpc_url(rpc_url: &str, commitment: &str, pools: Vec<PoolVaults>) -> Result<Self, SwapError> {
        let commitment = CommitmentConfig::from_str(commitment)
            .map_err(|e| SwapError::Oracle(format!("Invalid commitment '{}': {}", commitment, e)))?;
        Ok(Self::new(VaultReader::with_commitment(rpc_url.to_string(), commitment), pools))
    }

    fn find(&self, asset_a: &Pubkey, asset_b: &Pubkey) -> Option<(Pubkey, Pubkey)> {
        let mut matches = self.pools.iter().filter_map(|pool| pool.oriented(asset_a, asset_b));
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            warn!("Several pools trade {} / {}, using the first one", asset_a, asset_b);
        }
        first
    }
}

impl ReserveOracle for VaultReserveOracle {
    fn get_reserves(&self, asset_a: &Pubkey, asset_b: &Pubkey) -> Result<Option<PoolReserves>, SwapError> {
        let Some((vault_in, vault_out)) = self.find(asset_a, asset_b) else {
            return Ok(None);
        };
        let (reserve_in, reserve_out) = self.reader.get_pool_vault_balances(&vault_in, &vault_out)?;
        debug!("Vault reserves {} / {}: {} / {}", asset_a, asset_b, reserve_in, reserve_out);
        Ok(Some(PoolReserves::new(reserve_in, reserve_out)))
    }
}
