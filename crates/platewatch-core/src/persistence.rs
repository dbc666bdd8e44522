//! Saving engine state between runs
//!
//! The engine never touches storage itself. The binary loads a
//! [`PersistedState`] through a [`StatePort`] at startup and saves one at
//! shutdown.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::alerting::AlertEngine;
use crate::error::Result;
use crate::models::{AlertNotification, AlertRule};

/// Snapshot of everything worth keeping across restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Rule set, in evaluation order
    pub rules: Vec<AlertRule>,
    /// Notifications, newest first
    #[serde(default)]
    pub notifications: Vec<AlertNotification>,
}

impl PersistedState {
    /// Copy the engine's rules and notifications
    pub fn capture(engine: &AlertEngine) -> Self {
        Self {
            rules: engine.rules().to_vec(),
            notifications: engine.notifications().to_vec(),
        }
    }

    /// Load this snapshot into an engine, replacing its rules and notifications
    pub fn apply(self, engine: &mut AlertEngine) {
        engine.replace_rules(self.rules);
        engine.restore_notifications(self.notifications);
    }
}

/// Load/save port for engine state
pub trait StatePort: Send + Sync {
    /// Load saved state; `Ok(None)` when nothing was saved yet
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Save state, replacing whatever was there
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Stores state as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatePort for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No saved state");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&raw)?;
        info!(
            path = %self.path.display(),
            rules = state.rules.len(),
            notifications = state.notifications.len(),
            "Loaded saved state"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        // Sibling temp file, then rename over the target
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), rules = state.rules.len(), "Saved state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{default_rules, SensorSample};

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load_restores_engine() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));

        let mut engine = AlertEngine::new(&EngineConfig::default());
        engine.replace_rules(default_rules());
        engine.toggle_rule("5").unwrap();
        engine.process_sample(
            SensorSample::new()
                .with("temperature", 60.0)
                .with("voltage", 30.0),
        );
        let saved = PersistedState::capture(&engine);
        store.save(&saved).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, saved);

        let mut restored = AlertEngine::new(&EngineConfig::default());
        loaded.apply(&mut restored);
        assert_eq!(restored.rules(), engine.rules());
        assert_eq!(restored.notifications().len(), 1);
        assert!(!restored.rule("5").unwrap().is_active);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::new(path).load().is_err());
    }
}
