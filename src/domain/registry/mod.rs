//! Registry domain - which assets may be converted and whether they are paused

mod token_registry;

pub use token_registry::TokenRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use crate::shared::types::pubkey_string;

/// Registered token and its state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(with = "pubkey_string")]
    pub asset: Pubkey,
    pub active: bool,
}

/// Announcements published by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    TokenAdded(#[serde(with = "pubkey_string")] Pubkey),
    TokenPaused(#[serde(with = "pubkey_string")] Pubkey),
    TokenResumed(#[serde(with = "pubkey_string")] Pubkey),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryNotification {
    pub event: RegistryEvent,
    pub at: DateTime<Utc>,
}

/// On-disk form of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub entries: Vec<RegistryEntry>,
}
