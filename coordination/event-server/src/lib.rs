//! Coordination service: the event ledger, the dependency checks over it,
//! the HTTP endpoint nodes poll, and the driver-side coordinator and runner.

pub mod config;
pub mod coordinator;
pub mod ledger;
pub mod resolver;
pub mod runner;
pub mod server;

pub use config::{ConfigError, CoordinatorConfig, load_deployment};
pub use coordinator::{Coordinator, CoordinatorError};
pub use ledger::EventLedger;
pub use runner::Runner;
pub use server::coordination_app;
