//! Registry of the assets eligible for conversion

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::shared::errors::RegistryError;
use crate::shared::types::null_asset;
use super::{RegistryEntry, RegistryEvent, RegistryNotification, RegistrySnapshot};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Insertion-ordered set of supported tokens with their active/paused state.
///
/// Entries are never removed once added.
pub struct TokenRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<Pubkey, usize>,
    events: broadcast::Sender<RegistryNotification>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            events,
        }
    }

    /// Receiver for `TokenAdded`, `TokenPaused` and `TokenResumed` notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryNotification> {
        self.events.subscribe()
    }

    fn publish(&self, event: RegistryEvent) {
        debug!("Registry event: {:?}", event);
        // nobody listening is fine
        let _ = self.events.send(RegistryNotification { event, at: Utc::now() });
    }

    fn entry_mut(&mut self, asset: &Pubkey) -> Result<&mut RegistryEntry, RegistryError> {
        let position = *self.index.get(asset).ok_or(RegistryError::NotSupported(*asset))?;
        Ok(&mut self.entries[position])
    }

    pub fn add_token(&mut self, asset: Pubkey) -> Result<(), RegistryError> {
        if asset == null_asset() {
            return Err(RegistryError::InvalidAsset);
        }
        if self.index.contains_key(&asset) {
            return Err(RegistryError::AlreadySupported(asset));
        }

        self.index.insert(asset, self.entries.len());
        self.entries.push(RegistryEntry { asset, active: true });
        info!("Token {} added to the registry", asset);
        self.publish(RegistryEvent::TokenAdded(asset));
        Ok(())
    }

    pub fn is_supported(&self, asset: &Pubkey) -> bool {
        self.index.contains_key(asset)
    }

    /// `false` for unknown tokens
    pub fn is_paused(&self, asset: &Pubkey) -> bool {
        self.index
            .get(asset)
            .map(|&position| !self.entries[position].active)
            .unwrap_or(false)
    }

    /// Pausing a paused token is a no-op.
    pub fn pause_token(&mut self, asset: &Pubkey) -> Result<(), RegistryError> {
        let entry = self.entry_mut(asset)?;
        if !entry.active {
            return Ok(());
        }
        entry.active = false;
        info!("Token {} paused", asset);
        self.publish(RegistryEvent::TokenPaused(*asset));
        Ok(())
    }

    pub fn resume_token(&mut self, asset: &Pubkey) -> Result<(), RegistryError> {
        let entry = self.entry_mut(asset)?;
        if entry.active {
            return Err(RegistryError::NotPaused(*asset));
        }
        entry.active = true;
        info!("Token {} resumed", asset);
        self.publish(RegistryEvent::TokenResumed(*asset));
        Ok(())
    }

    /// Every registered token, paused ones included, in insertion order
    pub fn get_supported_tokens(&self) -> Vec<Pubkey> {
        self.entries.iter().map(|entry| entry.asset).collect()
    }

    pub fn active_tokens(&self) -> Vec<Pubkey> {
        self.entries
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.asset)
            .collect()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: self.entries.clone(),
        }
    }

    /// Rebuilds a registry without publishing events for the restored entries
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in snapshot.entries {
            if entry.asset == null_asset() {
                return Err(RegistryError::InvalidAsset);
            }
            if registry.index.contains_key(&entry.asset) {
                return Err(RegistryError::AlreadySupported(entry.asset));
            }
            registry.index.insert(entry.asset, registry.entries.len());
            registry.entries.push(entry);
        }
        Ok(registry)
    }

    /// Loads a JSON snapshot; a missing file gives an empty registry
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| RegistryError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&raw)
            .map_err(|e| RegistryError::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;
        Self::from_snapshot(snapshot)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| RegistryError::Storage(format!("Failed to encode registry: {}", e)))?;
        fs::write(path, raw)
            .map_err(|e| RegistryError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_add_token() {
        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();
        let weth = Pubkey::new_unique();

        registry.add_token(dai).unwrap();
        assert!(registry.is_supported(&dai));
        assert!(!registry.is_supported(&weth));
        assert!(!registry.is_paused(&dai));
    }

    #[test]
    fn test_add_rejects_null_and_duplicates() {
        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();

        assert_eq!(registry.add_token(Pubkey::default()), Err(RegistryError::InvalidAsset));
        registry.add_token(dai).unwrap();
        assert_eq!(registry.add_token(dai), Err(RegistryError::AlreadySupported(dai)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();
        registry.add_token(dai).unwrap();

        registry.pause_token(&dai).unwrap();
        assert!(registry.is_paused(&dai));
        assert!(registry.is_supported(&dai));
        // still listed while paused
        assert_eq!(registry.get_supported_tokens(), vec![dai]);
        assert!(registry.active_tokens().is_empty());

        registry.resume_token(&dai).unwrap();
        assert!(!registry.is_paused(&dai));
        assert_eq!(registry.resume_token(&dai), Err(RegistryError::NotPaused(dai)));
    }

    #[test]
    fn test_unknown_tokens() {
        let mut registry = TokenRegistry::new();
        let weth = Pubkey::new_unique();

        assert!(!registry.is_paused(&weth));
        assert_eq!(registry.pause_token(&weth), Err(RegistryError::NotSupported(weth)));
        assert_eq!(registry.resume_token(&weth), Err(RegistryError::NotSupported(weth)));
    }

    #[test]
    fn test_events_are_published() {
        let mut registry = TokenRegistry::new();
        let mut rx = registry.subscribe();
        let dai = Pubkey::new_unique();

        registry.add_token(dai).unwrap();
        registry.pause_token(&dai).unwrap();
        registry.pause_token(&dai).unwrap();
        registry.resume_token(&dai).unwrap();

        assert_eq!(rx.try_recv().unwrap().event, RegistryEvent::TokenAdded(dai));
        assert_eq!(rx.try_recv().unwrap().event, RegistryEvent::TokenPaused(dai));
        assert_eq!(rx.try_recv().unwrap().event, RegistryEvent::TokenResumed(dai));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_repeated_pause_announces_once() {
        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();
        registry.add_token(dai).unwrap();
        let mut rx = registry.subscribe();

        registry.pause_token(&dai).unwrap();
        assert_eq!(rx.try_recv().unwrap().event, RegistryEvent::TokenPaused(dai));

        registry.pause_token(&dai).unwrap();
        assert!(registry.is_paused(&dai));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_get_supported_tokens_keeps_everything() {
        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();
        let weth = Pubkey::new_unique();

        assert!(registry.get_supported_tokens().is_empty());
        registry.add_token(dai).unwrap();
        assert_eq!(registry.get_supported_tokens(), vec![dai]);
        registry.add_token(weth).unwrap();
        assert_eq!(registry.get_supported_tokens(), vec![dai, weth]);
    }

    #[test]
    fn test_snapshot_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = TokenRegistry::new();
        let dai = Pubkey::new_unique();
        let weth = Pubkey::new_unique();
        registry.add_token(dai).unwrap();
        registry.add_token(weth).unwrap();
        registry.pause_token(&weth).unwrap();
        registry.save(&path).unwrap();

        let restored = TokenRegistry::load(&path).unwrap();
        assert_eq!(restored.entries(), registry.entries());
        assert!(restored.is_paused(&weth));

        let empty = TokenRegistry::load(dir.path().join("missing.json")).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let dai = Pubkey::new_unique();
        let snapshot = RegistrySnapshot {
            entries: vec![
                RegistryEntry { asset: dai, active: true },
                RegistryEntry { asset: dai, active: false },
            ],
        };
        assert_eq!(
            TokenRegistry::from_snapshot(snapshot).err(),
            Some(RegistryError::AlreadySupported(dai))
        );
    }
}
