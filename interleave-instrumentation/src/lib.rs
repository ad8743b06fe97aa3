//! Turns a deployment into per-node instrumentation plans and hands them to
//! the instrumentor registered for each node's service kind.

pub mod compiler;
pub mod error;
pub mod instrumentor;
pub mod operation;
pub mod requests;

pub use compiler::compile;
pub use error::InstrumentationError;
pub use instrumentor::{
    InstrumentationEngine, Instrumentor, NodeWorkspace, PLAN_FILE_NAME, PlanFile,
    PlanFileInstrumentor,
};
pub use operation::{InstrumentationPlan, InstrumentationPoint, InstrumentationRequest, Operation};
pub use requests::{event_requests, node_requests};
