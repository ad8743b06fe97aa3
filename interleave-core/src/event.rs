use std::{borrow::Borrow, collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Frame designating the program entry of an instrumented binary.
pub const ENTRY_LOCATION: &str = "main";

pub(crate) fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name of an event. Restricted to `[A-Za-z0-9_]+` so it can appear in a run
/// sequence and in a URL path segment unescaped.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventName(String);

impl EventName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if is_identifier(&name) {
            Ok(Self(name))
        } else {
            Err(ConfigurationError::InvalidEventName(name))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EventName {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventName> for String {
    fn from(name: EventName) -> Self {
        name.0
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an instrumentation point sits before or after the located method body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Before,
    After,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// A symbolic stack-trace location, innermost frame first.
///
/// The first frame is the method that receives the instrumentation. The
/// remaining frames are callers that have to be on the observed stack, in the
/// same relative order, for the location to count as reached.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackLocation {
    frames: Vec<String>,
}

impl StackLocation {
    /// Parses a comma separated frame list such as `app::flush,app::run`.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let frames = raw
            .split(',')
            .map(str::trim)
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();

        if frames
            .iter()
            .any(|frame| frame.is_empty() || frame.chars().any(char::is_whitespace))
        {
            return Err(ConfigurationError::InvalidStackLocation(raw.to_owned()));
        }

        Ok(Self { frames })
    }

    #[must_use]
    pub fn entry() -> Self {
        Self {
            frames: vec![ENTRY_LOCATION.to_owned()],
        }
    }

    /// The method that hosts the instrumentation point.
    #[must_use]
    pub fn method(&self) -> &str {
        // `parse` rejects empty frame lists.
        &self.frames[0]
    }

    #[must_use]
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.method() == ENTRY_LOCATION
    }

    /// Checks the location against an observed stack (innermost first).
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, observed: &[S]) -> bool {
        let mut observed = observed.iter().map(AsRef::as_ref);
        self.frames
            .iter()
            .all(|expected| observed.any(|frame| frame == expected))
    }
}

impl TryFrom<String> for StackLocation {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StackLocation> for String {
    fn from(location: StackLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for StackLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.frames.join(","))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingOperation {
    Block,
    Unblock,
}

/// A scheduling event pins down the code location of a stack-trace event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulingEvent {
    pub operation: SchedulingOperation,
    pub target: EventName,
    pub position: Position,
    /// Unblock events releasing this block. Always `None` for unblock events.
    pub condition: Option<BTreeSet<EventName>>,
    /// Set when the event is referenced by the run sequence.
    pub active: bool,
}

impl SchedulingEvent {
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.operation == SchedulingOperation::Block && self.active
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    StackTrace { location: StackLocation },
    Scheduling(SchedulingEvent),
    /// Runs the node's collector from the program entry, off the main path.
    GarbageCollection,
    TestCase,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub name: EventName,
    /// Owning node. Test-case events belong to the driver, not to a node.
    pub node: Option<String>,
    pub kind: EventKind,
    /// Prerequisites derived from the run sequence.
    pub depends_on: BTreeSet<EventName>,
}

impl Event {
    #[must_use]
    pub fn location(&self) -> Option<&StackLocation> {
        match &self.kind {
            EventKind::StackTrace { location } => Some(location),
            _ => None,
        }
    }

    #[must_use]
    pub const fn scheduling(&self) -> Option<&SchedulingEvent> {
        match &self.kind {
            EventKind::Scheduling(scheduling) => Some(scheduling),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_test_case(&self) -> bool {
        matches!(self.kind, EventKind::TestCase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_identifiers() {
        assert!(EventName::new("e_1").is_ok());
        assert!(EventName::new("").is_err());
        assert!(EventName::new("e 1").is_err());
        assert!(EventName::new("e*1").is_err());
    }

    #[test]
    fn stack_location_rejects_blank_frames() {
        assert!(StackLocation::parse("app::flush, app::run").is_ok());
        assert!(StackLocation::parse("app::flush,,app::run").is_err());
        assert!(StackLocation::parse(" ").is_err());
        assert!(StackLocation::parse("app::flush,").is_err());
    }

    #[test]
    fn stack_location_matches_callers_in_order() {
        let location = StackLocation::parse("app::flush,app::run").unwrap();
        assert_eq!(location.method(), "app::flush");
        assert!(location.matches(&["app::flush", "app::batch", "app::run", "main"]));
        assert!(!location.matches(&["app::flush", "main"]));
        assert!(!location.matches(&["app::run", "app::flush"]));
    }

    #[test]
    fn entry_location() {
        assert!(StackLocation::entry().is_entry());
        assert!(StackLocation::parse("main").unwrap().is_entry());
        assert!(!StackLocation::parse("app::main").unwrap().is_entry());
    }
}
