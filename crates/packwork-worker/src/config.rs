//! Configuration types for the worker agent.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Connection to the Workforce.
    pub workforce: HubConfig,
    /// Package folder watching.
    pub watcher: WatcherConfig,
    /// Delayed removal sweeping.
    pub removal: RemovalConfig,
}

/// Workforce connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address of the Workforce adapter listener.
    pub addr: SocketAddr,
    /// Client id to announce; generated when unset.
    pub client_id: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8070),
            client_id: None,
        }
    }
}

/// Package folder watching configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Folder whose packages are watched and swept.
    pub dir: PathBuf,
    /// How long a file's size must hold steady before a change event is
    /// considered final. `None` emits immediately.
    #[serde(with = "serde_opt_duration_millis")]
    pub stability_threshold: Option<Duration>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("packages"),
            stability_threshold: Some(Duration::from_millis(4000)),
        }
    }
}

/// Delayed removal configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Interval of the sweep that deletes due packages.
    #[serde(with = "serde_duration_secs")]
    pub sweep_interval: Duration,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Serde helper for Option<Duration> as milliseconds.
mod serde_opt_duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.workforce.addr.port(), 8070);
        assert_eq!(
            config.watcher.stability_threshold,
            Some(Duration::from_millis(4000))
        );
        assert_eq!(config.removal.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn stability_threshold_can_be_disabled() {
        let config: WatcherConfig =
            serde_json::from_str(r#"{"dir": "pkg", "stability_threshold": null}"#).unwrap();
        assert_eq!(config.stability_threshold, None);
    }
}
