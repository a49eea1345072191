// Application state management

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::EngineError;

pub type SharedState = Arc<Mutex<AppState>>;

#[derive(Debug, Error)]
pub enum StateError {
    /// A snapshot exists but could not be restored. Start-up stops here so
    /// the next save cannot overwrite it.
    #[error("Snapshot {} is unreadable: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct AppState {
    pub engine: Engine,
    pub config: EngineConfig,
}

impl AppState {
    /// Restore the last snapshot, or start a fresh engine from config
    pub fn new(config: EngineConfig) -> Result<Self, StateError> {
        info!("🚀 Initializing settlement engine...");

        let engine = match Self::load_from_disk(&config)? {
            Some(engine) => {
                info!(
                    markets = engine.markets.len(),
                    events = engine.events.len(),
                    "✅ Loaded persisted state from disk"
                );
                engine
            }
            None => {
                info!(path = %config.state_path.display(), "ℹ️  No persisted state found, starting fresh");
                Engine::new(&config.owner, config.fee_split, config.recipients.clone())?
            }
        };

        Ok(Self { engine, config })
    }

    /// In-memory state that never touches disk
    pub fn ephemeral(config: EngineConfig) -> Result<Self, EngineError> {
        let engine = Engine::new(&config.owner, config.fee_split, config.recipients.clone())?;
        Ok(Self { engine, config })
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        let path = &self.config.state_path;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        }

        let json =
            serde_json::to_string_pretty(&self.engine).map_err(|e| format!("Failed to serialize state: {}", e))?;

        fs::write(path, json).map_err(|e| format!("Failed to write state file: {}", e))?;

        info!(path = %path.display(), "💾 State saved to disk");
        Ok(())
    }

    /// `None` only when no snapshot file exists
    fn load_from_disk(config: &EngineConfig) -> Result<Option<Engine>, StateError> {
        let unreadable = |reason: String| StateError::Snapshot {
            path: config.state_path.clone(),
            reason,
        };

        let json = match fs::read_to_string(&config.state_path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unreadable(e.to_string())),
        };

        let engine: Engine = serde_json::from_str(&json).map_err(|e| unreadable(e.to_string()))?;

        if engine.owner != config.owner {
            warn!(
                snapshot_owner = %engine.owner,
                configured_owner = %config.owner,
                "⚠️  Snapshot owner differs from ENGINE_OWNER; keeping the snapshot"
            );
        }
        Ok(Some(engine))
    }
}
