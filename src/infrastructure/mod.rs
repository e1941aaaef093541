//! Infrastructure layer - ledgers and blockchain reads

pub mod blockchain;
pub mod ledger;
