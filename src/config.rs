use crate::error::ConfigError;
use crate::{INFERENCE_DELAY_MS, KNN_K, NOTIFICATION_COOLDOWN_MS, TRAINING_DELAY_MS, TRAINING_TIMES};
use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub training_times: usize,
    pub training_delay_ms: u64,
    pub inference_delay_ms: u64,
    pub knn_k: usize,
    pub notification_cooldown_ms: u64,
    pub notification_title: String,
    pub notification_body: String,
    pub alert_cue_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            training_times: TRAINING_TIMES,             // samples per label
            training_delay_ms: TRAINING_DELAY_MS,       // pause after each training sample
            inference_delay_ms: INFERENCE_DELAY_MS,     // pause between inference cycles
            knn_k: KNN_K,                               // neighbours that vote on a query
            notification_cooldown_ms: NOTIFICATION_COOLDOWN_MS, // repeat notifications swallowed inside this window
            notification_title: "Hands off".to_string(),
            notification_body: "You just touched your face.".to_string(),
            alert_cue_path: None, // None plays the bundled cue
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<SessionConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SessionConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded session config {:?}", config);
        Ok(config)
    }

    /// Falls back to defaults when the file is absent or broken.
    pub fn load_or_default(path: &Path) -> SessionConfig {
        SessionConfig::load(path).unwrap_or_else(|e| {
            warn!("Can't load {:?}; error {}. Using defaults", path, e);
            SessionConfig::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training_times == 0 {
            return Err(ConfigError::Invalid("training_times must be at least 1".into()));
        }
        if self.knn_k == 0 {
            return Err(ConfigError::Invalid("knn_k must be at least 1".into()));
        }
        Ok(())
    }

    pub fn training_delay(&self) -> Duration {
        Duration::from_millis(self.training_delay_ms)
    }

    pub fn inference_delay(&self) -> Duration {
        Duration::from_millis(self.inference_delay_ms)
    }

    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_millis(self.notification_cooldown_ms)
    }
}
