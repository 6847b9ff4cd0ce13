//! Configuration types for the Workforce.

use packwork_proto::AppType;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Workforce configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkforceConfig {
    /// Adapter connection listener.
    pub server: ServerConfig,
    /// HTTP status API.
    pub api: ApiConfig,
    /// Worker-pool scheduling.
    pub handler: HandlerConfig,
    /// CPU sampling.
    pub cpu: CpuConfig,
}

/// Adapter listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to accept client connections on.
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8070),
        }
    }
}

/// HTTP status API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to serve the status API on.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8071),
        }
    }
}

/// Worker-pool scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Debounce between a trigger and its reconciliation pass.
    #[serde(with = "serde_duration_millis")]
    pub debounce: Duration,
    /// Interval of the periodic reconciliation trigger.
    #[serde(with = "serde_duration_secs")]
    pub trigger_interval: Duration,
    /// App types that must be kept running.
    pub needs: Vec<AppType>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            trigger_interval: Duration::from_secs(10),
            needs: vec!["worker".to_owned()],
        }
    }
}

/// CPU sampling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Interval between samples.
    #[serde(with = "serde_duration_millis")]
    pub sample_interval: Duration,
    /// Per-core usage fraction below which a core counts as idle.
    pub idle_threshold: f64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(5000),
            idle_threshold: 0.25,
        }
    }
}

/// Serde helper for Duration as milliseconds.
mod serde_duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
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
