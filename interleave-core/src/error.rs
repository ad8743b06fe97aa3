/// Errors in a deployment definition.
///
/// Every variant is detected before any node is instrumented or started and
/// is never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{referenced_kind} `{referenced}` referenced in {owner_kind} `{owner}` does not exist")]
    BadReference {
        referenced_kind: &'static str,
        referenced: String,
        owner_kind: &'static str,
        owner: String,
    },
    #[error("`{0}` is not a valid event name")]
    InvalidEventName(String),
    #[error("`{0}` is not a valid stack location")]
    InvalidStackLocation(String),
    #[error("invalid run sequence `{sequence}`: {reason}")]
    InvalidRunSequence { sequence: String, reason: String },
    #[error("{kind} `{name}` is defined more than once")]
    Duplicate { kind: &'static str, name: String },
    #[error("dependency cycle detected at event `{0}`")]
    DependencyCycle(String),
}

impl ConfigurationError {
    #[must_use]
    pub fn bad_reference(
        referenced_kind: &'static str,
        referenced: impl Into<String>,
        owner_kind: &'static str,
        owner: impl Into<String>,
    ) -> Self {
        Self::BadReference {
            referenced_kind,
            referenced: referenced.into(),
            owner_kind,
            owner: owner.into(),
        }
    }

    pub(crate) fn run_sequence(sequence: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRunSequence {
            sequence: sequence.to_owned(),
            reason: reason.into(),
        }
    }
}
