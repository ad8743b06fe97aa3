//! Environment published into every node process so the embedded client can
//! find the coordinator.

pub const COORDINATOR_HOST: &str = "INTERLEAVE_COORDINATOR_HOST";
pub const COORDINATOR_PORT: &str = "INTERLEAVE_COORDINATOR_PORT";
