use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use interleave_core::Deployment;
use interleave_event_server::{CoordinatorConfig, load_deployment};
use tracing_subscriber::{EnvFilter, fmt::TestWriter};

/// Time given to a node that should stay blocked before checking that it
/// did.
pub const SETTLE: Duration = Duration::from_millis(300);

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .compact()
        .with_writer(TestWriter::default())
        .try_init();
}

#[must_use]
pub fn coordinator_config(plan_directory: &Path) -> CoordinatorConfig {
    CoordinatorConfig {
        bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        poll_interval: POLL_INTERVAL,
        completion_timeout: Some(Duration::from_secs(10)),
        plan_directory: plan_directory.to_owned(),
        ..CoordinatorConfig::default()
    }
}

/// Loads a deployment shipped under `deployments/`.
#[must_use]
pub fn deployment(file: &str) -> Deployment {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("deployments")
        .join(file);
    load_deployment(&path).unwrap()
}
