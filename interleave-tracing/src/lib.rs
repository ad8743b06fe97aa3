use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

const DEFAULT_LOG_FILE: &str = "interleave.log";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoggerLayer {
    #[default]
    Stdout,
    Json,
    File(FileConfig),
    None,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingSettings {
    #[serde(default)]
    pub logger: LoggerLayer,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_level")]
    pub level: Level,
}

const fn default_level() -> Level {
    Level::INFO
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            logger: LoggerLayer::default(),
            level: default_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Installs the global subscriber described by `settings`.
///
/// `RUST_LOG` directives take precedence over `settings.level`. The returned
/// guard flushes the file logger and has to be kept alive until exit.
pub fn init(settings: &TracingSettings) -> Result<Option<WorkerGuard>, TracingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.level).into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match &settings.logger {
        LoggerLayer::Stdout => subscriber
            .compact()
            .try_init()
            .map(|()| None)
            .map_err(|err| TracingError::Init(err.to_string())),
        LoggerLayer::Json => subscriber
            .json()
            .try_init()
            .map(|()| None)
            .map_err(|err| TracingError::Init(err.to_string())),
        LoggerLayer::File(config) => {
            fs::create_dir_all(&config.directory).map_err(|source| TracingError::Directory {
                path: config.directory.clone(),
                source,
            })?;
            let file_name = config
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
            let appender = tracing_appender::rolling::never(&config.directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            subscriber
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|err| TracingError::Init(err.to_string()))?;
            Ok(Some(guard))
        }
        LoggerLayer::None => Ok(None),
    }
}
