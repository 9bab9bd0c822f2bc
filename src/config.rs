use crate::error::TrackmeError;
use crate::store::ConnectionStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Service configuration, usually read from `config.json`.
///
/// Every field has a default, so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture interface. `None` or an empty string selects one automatically.
    pub device: Option<String>,
    /// Address the TLS server binds to. A specific address is used as the egress address
    /// when auto-selecting the capture interface.
    pub host: String,
    /// TLS listen port; only segments towards this port are captured.
    pub tls_port: u16,
    pub log_file: Option<String>,
    pub store_capacity: usize,
    pub store_ttl_secs: u64,
    pub read_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            host: "0.0.0.0".to_string(),
            tls_port: 443,
            log_file: None,
            store_capacity: 100_000,
            store_ttl_secs: 30,
            read_timeout_ms: 100,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrackmeError> {
        let data = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackmeError> {
        if self.tls_port == 0 {
            return Err(TrackmeError::Misconfiguration("tls_port must not be 0".to_string()));
        }
        if self.store_capacity == 0 {
            return Err(TrackmeError::Misconfiguration(
                "store_capacity must be at least 1".to_string(),
            ));
        }
        if self.store_ttl_secs == 0 {
            return Err(TrackmeError::Misconfiguration(
                "store_ttl_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured device, with empty strings treated as absent.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store_ttl_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Handles shared by the capture listener, the assembler and the router.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub store: ConnectionStore,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, TrackmeError> {
        config.validate()?;
        let store = ConnectionStore::new(config.store_capacity, config.store_ttl());
        Ok(Self { config: Arc::new(config), store })
    }
}
