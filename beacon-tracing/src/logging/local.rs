// std
use std::io::Write;
use std::path::PathBuf;
// crates
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::Layer;
// internal

pub type FmtLayer<S> = Layer<S, DefaultFields, Format, NonBlocking>;

const DEFAULT_FILE_PREFIX: &str = "beacon.log";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRotation {
    Minutely,
    #[default]
    Hourly,
    Daily,
    Never,
}

impl From<FileRotation> for Rotation {
    fn from(rotation: FileRotation) -> Self {
        match rotation {
            FileRotation::Minutely => Rotation::MINUTELY,
            FileRotation::Hourly => Rotation::HOURLY,
            FileRotation::Daily => Rotation::DAILY,
            FileRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub prefix: Option<PathBuf>,
    #[serde(default)]
    pub rotation: FileRotation,
}

pub fn create_file_layer<S>(config: FileConfig) -> (FmtLayer<S>, WorkerGuard) {
    let appender = tracing_appender::rolling::RollingFileAppender::new(
        config.rotation.into(),
        config.directory,
        config
            .prefix
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PREFIX)),
    );
    create_writer_layer(appender)
}

/// Logs are written from a background worker. Pending lines are flushed when
/// the guard is dropped.
pub fn create_writer_layer<S, W>(writer: W) -> (FmtLayer<S>, WorkerGuard)
where
    W: Write + Send + 'static,
{
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let layer = Layer::new()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking);
    (layer, guard)
}
