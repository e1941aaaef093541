//! Direct blockchain reads of pool vaults

pub mod vault_reader;

pub use vault_reader::{PoolVaults, VaultReader, VaultReserveOracle};
