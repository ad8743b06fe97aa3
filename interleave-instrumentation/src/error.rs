use std::{io, path::PathBuf};

use interleave_core::{ConfigurationError, ServiceKind};

#[derive(Debug, thiserror::Error)]
pub enum InstrumentationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("no instrumentor registered for service kind `{kind}` of node `{node}`")]
    NoInstrumentor { node: String, kind: ServiceKind },
    #[error("no workspace provided for node `{0}`")]
    MissingWorkspace(String),
    #[error("failed to write instrumentation plan to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode instrumentation plan: {0}")]
    Encode(#[from] serde_json::Error),
}
