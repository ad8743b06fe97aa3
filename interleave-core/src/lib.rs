//! Deployment model shared by the coordinator, the instrumentation compiler
//! and the embedded runtime: events, nodes, services, the run-sequence
//! grammar and the verification pass.

pub mod deployment;
pub mod error;
pub mod event;
pub mod run_sequence;
pub mod verification;

pub use deployment::{
    Deployment, DeploymentDefinition, EventDefinition, Node, NodeDefinition, Service, ServiceKind,
};
pub use error::ConfigurationError;
pub use event::{
    ENTRY_LOCATION, Event, EventKind, EventName, Position, SchedulingEvent, SchedulingOperation,
    StackLocation,
};
pub use run_sequence::RunSequence;
pub use verification::verify;
