//! Typed controller settings read from the merged config document.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8899";

/// Whole controller configuration. Every key is optional in YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub controller: ControllerSection,
    pub http: HttpSection,
    pub log: LogSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub max_concurrent_reconciles: usize,
    /// Seconds between full resyncs of root policies. 0 disables resync.
    pub resync_interval_secs: u64,
    pub retry: RetrySection,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: 2,
            resync_interval_secs: 300,
            retry: RetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub bind_addr: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Object fixture used to seed the in-memory store.
    pub objects_path: Option<PathBuf>,
}

impl ControllerConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: ControllerConfig = serde_json::from_value(config_json.clone())
            .context("config does not match the controller schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.controller.max_concurrent_reconciles == 0 {
            bail!("CONFIG_INVALID controller.max_concurrent_reconciles must be at least 1");
        }
        let retry = &self.controller.retry;
        if retry.base_delay_ms > retry.max_delay_ms {
            bail!(
                "CONFIG_INVALID controller.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                retry.base_delay_ms,
                retry.max_delay_ms
            );
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.http
            .bind_addr
            .parse()
            .with_context(|| format!("invalid http.bind_addr: {}", self.http.bind_addr))
    }

    /// `None` when periodic resync is disabled.
    pub fn resync_interval(&self) -> Option<Duration> {
        match self.controller.resync_interval_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.controller.retry.base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.controller.retry.max_delay_ms)
    }
}
