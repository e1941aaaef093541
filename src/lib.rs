//! Tokenswap - converts supported assets into one settlement asset over
//! constant-product pools, gated by a token registry

pub mod domain;
pub mod infrastructure;
pub mod math;
pub mod shared;

// Re-export main types for convenience
pub use domain::registry::TokenRegistry;
pub use domain::swap::{Route, SwapHelper, SwapSettings};
pub use infrastructure::ledger::InMemoryLedger;
pub use shared::errors::{RegistryError, SwapError};
