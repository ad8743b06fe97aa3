use std::fmt;

use interleave_core::{ENTRY_LOCATION, EventName, Position, StackLocation};
use serde::{Deserialize, Serialize};

/// Runtime call injected at an instrumentation point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    /// Permits blocking waits later in the same call frame.
    AllowBlocking,
    /// Waits for the event's prerequisites, then reports the event.
    EnforceOrder {
        event: EventName,
        location: StackLocation,
    },
    /// Waits until the blocking condition of a block event is satisfied.
    BlockUntilReleased {
        event: EventName,
        location: StackLocation,
    },
    /// Starts a background collection that runs in the event's turn and
    /// then reports it. Only placed at the program entry.
    GarbageCollection { event: EventName },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentationPoint {
    pub method: String,
    pub position: Position,
}

impl InstrumentationPoint {
    #[must_use]
    pub fn new(method: impl Into<String>, position: Position) -> Self {
        Self {
            method: method.into(),
            position,
        }
    }

    #[must_use]
    pub fn entry() -> Self {
        Self::new(ENTRY_LOCATION, Position::Before)
    }

    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.method == ENTRY_LOCATION
    }
}

impl fmt::Display for InstrumentationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.position, self.method)
    }
}

/// A single `(point, operation)` pair requested by one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentationRequest {
    pub point: InstrumentationPoint,
    pub operation: Operation,
}

impl InstrumentationRequest {
    #[must_use]
    pub const fn new(point: InstrumentationPoint, operation: Operation) -> Self {
        Self { point, operation }
    }
}

/// Merged, ordered operations for one instrumentation point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationPlan {
    pub point: InstrumentationPoint,
    pub operations: Vec<Operation>,
}

impl InstrumentationPlan {
    #[must_use]
    pub const fn new(point: InstrumentationPoint) -> Self {
        Self {
            point,
            operations: Vec::new(),
        }
    }
}
