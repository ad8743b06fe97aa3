use std::{
    fs, io,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use interleave_core::Deployment;
use interleave_tracing::TracingSettings;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings of the coordination endpoint and the run it supervises.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Port 0 picks an ephemeral port.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Host published to nodes, which may differ from the bind address
    /// when nodes run in containers.
    #[serde(default = "default_advertised_host")]
    pub advertised_host: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub completion_timeout: Option<Duration>,
    /// Longest idle time between receipts while the run sequence is
    /// incomplete.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub stall_timeout: Option<Duration>,
    #[serde(default = "default_plan_directory")]
    pub plan_directory: PathBuf,
    #[serde(default)]
    pub tracing: TracingSettings,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

fn default_advertised_host() -> String {
    Ipv4Addr::LOCALHOST.to_string()
}

const fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_plan_directory() -> PathBuf {
    PathBuf::from("interleave-plans")
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            advertised_host: default_advertised_host(),
            poll_interval: default_poll_interval(),
            completion_timeout: None,
            stall_timeout: None,
            plan_directory: default_plan_directory(),
            tracing: TracingSettings::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_yaml(path)
    }
}

/// Loads a deployment definition. The run sequence is parsed on load;
/// references are checked later by verification.
pub fn load_deployment(path: &Path) -> Result<Deployment, ConfigError> {
    load_yaml(path)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}
