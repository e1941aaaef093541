//! Exchange domain - the pool, transfer and execution interfaces the helper consumes

mod exchange_interface;

pub use exchange_interface::{AssetLedger, ExchangeEngine, Ledger, NativeWrapper, ReserveOracle};
