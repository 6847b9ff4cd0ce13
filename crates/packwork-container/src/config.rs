//! Configuration types for the app container.

use packwork_proto::AppDesc;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Container configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Connection to the Workforce.
    pub workforce: HubConfig,
    /// Apps this container can host.
    pub apps: Vec<AppConfig>,
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

/// One hostable app type.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// App type name.
    pub app_type: String,
    /// Relative cost of running this app type here.
    #[serde(default = "default_cost")]
    pub cost: u32,
    /// Executable to spawn.
    pub exec: PathBuf,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

const fn default_cost() -> u32 {
    1
}

impl AppConfig {
    /// The capability entry reported to the Workforce.
    #[must_use]
    pub fn to_desc(&self) -> AppDesc {
        AppDesc {
            app_type: self.app_type.clone(),
            cost: self.cost,
        }
    }
}
