pub mod filter;
pub mod logging;
pub mod panic;

// std
use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::sync::{Arc, Mutex};
// crates
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, ParseError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::Layer;
// internal
use crate::filter::envfilter::{create_envfilter_layer, EnvFilterConfig};
use crate::logging::local::{create_file_layer, create_writer_layer, FileConfig};

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Clonable handle to a writer, so an in-memory sink can sit in settings.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<dyn Write + Send + Sync>>,
}

impl SharedWriter {
    pub fn new<W: Write + Send + Sync + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn from_inner(inner: Arc<Mutex<dyn Write + Send + Sync>>) -> Self {
        Self { inner }
    }

    pub fn into_inner(&self) -> Arc<Mutex<dyn Write + Send + Sync>> {
        Arc::clone(&self.inner)
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut (dyn Write + Send + Sync)) -> std::io::Result<T>,
    ) -> std::io::Result<T> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| std::io::Error::other("shared writer lock poisoned"))?;
        f(&mut *writer)
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_writer(|writer| writer.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_writer(|writer| writer.flush())
    }
}

impl Debug for SharedWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWriter").finish()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum LoggerLayer {
    File(FileConfig),
    #[default]
    Stdout,
    Stderr,
    #[serde(skip)]
    Writer(SharedWriter),
    // do not collect logs
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterLayer {
    EnvFilter(EnvFilterConfig),
    #[default]
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingSettings {
    #[serde(default)]
    pub logger: LoggerLayer,
    #[serde(default)]
    pub filter: FilterLayer,
    #[serde(with = "serde_level", default = "default_level")]
    pub level: Level,
}

fn default_level() -> Level {
    Level::INFO
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            logger: LoggerLayer::Stdout,
            filter: FilterLayer::None,
            level: default_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Invalid filter directives: {0}")]
    Filter(#[from] ParseError),
    #[error("Global subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps the background log writer alive. Dropping it flushes pending lines.
#[derive(Debug, Default)]
pub struct TracingGuard {
    _logger: Option<WorkerGuard>,
}

/// Layers described by `settings`, for any registry based subscriber.
pub fn create_layers<S>(
    settings: &TracingSettings,
) -> Result<(Vec<BoxedLayer<S>>, TracingGuard), TracingError>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let mut layers: Vec<BoxedLayer<S>> = Vec::new();
    let guard = match settings.logger.clone() {
        LoggerLayer::File(config) => {
            let (layer, guard) = create_file_layer(config);
            layers.push(Box::new(layer));
            Some(guard)
        }
        LoggerLayer::Stdout => {
            let (layer, guard) = create_writer_layer(std::io::stdout());
            layers.push(Box::new(layer));
            Some(guard)
        }
        LoggerLayer::Stderr => {
            let (layer, guard) = create_writer_layer(std::io::stderr());
            layers.push(Box::new(layer));
            Some(guard)
        }
        LoggerLayer::Writer(writer) => {
            let (layer, guard) = create_writer_layer(writer);
            layers.push(Box::new(layer));
            Some(guard)
        }
        LoggerLayer::None => None,
    };
    if let FilterLayer::EnvFilter(config) = &settings.filter {
        layers.push(Box::new(create_envfilter_layer(config)?));
    }
    Ok((layers, TracingGuard { _logger: guard }))
}

/// Install the global subscriber and route panics through it.
pub fn init(settings: &TracingSettings) -> Result<TracingGuard, TracingError> {
    let (layers, guard) = create_layers(settings)?;
    tracing_subscriber::registry()
        .with(LevelFilter::from_level(settings.level))
        .with(layers)
        .try_init()?;
    std::panic::set_hook(Box::new(panic::panic_hook));
    Ok(guard)
}

mod serde_level {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use super::Level;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).and_then(|level| {
            level
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid log level {e}")))
        })
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(value: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.as_str().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::Layered;
    use tracing_subscriber::Registry;

    use super::*;
    use crate::logging::local::FileRotation;

    fn captured(settings: &TracingSettings, emit: impl FnOnce()) {
        let (layers, guard) =
            create_layers::<Layered<LevelFilter, Registry>>(settings).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::from_level(settings.level))
            .with(layers);
        tracing::subscriber::with_default(subscriber, emit);
        drop(guard);
    }

    #[test]
    fn settings_from_yaml() {
        let settings: TracingSettings = serde_yaml::from_str(
            "logger: !File\n  directory: /tmp/beacon\nfilter: !EnvFilter\n  filters:\n    beacon_ledger: debug\nlevel: WARN\n",
        )
        .unwrap();
        assert_eq!(settings.level, Level::WARN);
        let LoggerLayer::File(file) = settings.logger else {
            panic!("expected a file logger");
        };
        assert_eq!(file.rotation, FileRotation::Hourly);
        assert!(file.prefix.is_none());
        let FilterLayer::EnvFilter(filter) = settings.filter else {
            panic!("expected an env filter");
        };
        assert_eq!(filter.directives(), "beacon_ledger=debug");
    }

    #[test]
    fn defaults_log_info_to_stdout() {
        let settings: TracingSettings = serde_yaml::from_str("{}").unwrap();
        assert!(matches!(settings.logger, LoggerLayer::Stdout));
        assert_eq!(settings.filter, FilterLayer::None);
        assert_eq!(settings.level, Level::INFO);
    }

    #[test]
    fn writer_receives_events_above_level() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::default();
        let settings = TracingSettings {
            logger: LoggerLayer::Writer(SharedWriter::from_inner(buffer.clone())),
            filter: FilterLayer::None,
            level: Level::INFO,
        };
        captured(&settings, || {
            tracing::info!(slot = 7, "imported block");
            tracing::debug!("too verbose");
        });
        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.contains("imported block"));
        assert!(output.contains("slot=7"));
        assert!(!output.contains("too verbose"));
    }

    #[test]
    fn file_logger_writes_to_directory() {
        let directory = tempfile::tempdir().unwrap();
        let settings = TracingSettings {
            logger: LoggerLayer::File(FileConfig {
                directory: directory.path().to_path_buf(),
                prefix: Some("import.log".into()),
                rotation: FileRotation::Never,
            }),
            filter: FilterLayer::None,
            level: Level::INFO,
        };
        captured(&settings, || tracing::warn!("sidecar missing"));
        let contents = std::fs::read_to_string(directory.path().join("import.log")).unwrap();
        assert!(contents.contains("sidecar missing"));
    }
}
