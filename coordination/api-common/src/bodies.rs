use serde::{Deserialize, Serialize};
use serde_with::{BoolFromInt, serde_as};

/// Body of a receipt submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReceipt {
    pub name: String,
}

impl EventReceipt {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Query string of a dependency check. `includeEvent=1` additionally requires
/// the event itself to have been received.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyQuery {
    #[serde_as(as = "BoolFromInt")]
    #[serde(rename = "includeEvent", default)]
    pub include_event: bool,
}

impl DependencyQuery {
    #[must_use]
    pub const fn new(include_event: bool) -> Self {
        Self { include_event }
    }
}
