//! Structured logging for Bellhop simulations
//!
//! Every router, host and the link layer runs inside a `node` span carrying
//! its identifier, so each line of output can be attributed to the element
//! that produced it.
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines for later analysis (default)
//! - **Pretty Output**: human-readable console lines for interactive runs
//! - **File Rotation**: daily/hourly log rotation via tracing-appender
//! - **RUST_LOG**: always overrides the configured level
//!
//! # Quick Start
//!
//! ```ignore
//! use bellhop_logging::{BellhopSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = BellhopSubscriberBuilder::new().init();
//!
//! // Pretty console output at debug level
//! let _guard = BellhopSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open rolling log file: {0}")]
    Appender(#[from] InitError),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and installing the Bellhop logging subscriber
///
/// By default, console output uses JSONL format. Use
/// `LogConfig::development()` for human-readable output.
pub struct BellhopSubscriberBuilder {
    config: LogConfig,
}

impl BellhopSubscriberBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch the console between pretty and JSONL output
    pub fn with_pretty_console(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration the subscriber will be built from
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn json_layer(&self) -> tracing_subscriber::fmt::Layer<
        Registry,
        tracing_subscriber::fmt::format::JsonFields,
        tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Json>,
    > {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
    }

    fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
        let rotation = match file.rotation {
            RotationStrategy::Never => {
                fs::create_dir_all(&file.directory)?;
                let path = file.directory.join(format!("{}.log", file.prefix));
                return Ok(tracing_appender::non_blocking(File::create(path)?));
            }
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
        };
        let appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(&file.prefix)
            .build(&file.directory)?;
        Ok(tracing_appender::non_blocking(appender))
    }

    /// Assemble the output layers, returning the file writer guard if any
    fn layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LoggingError> {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            if self.config.console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(false)
                        .boxed(),
                );
            } else {
                layers.push(self.json_layer().boxed());
            }
        }

        if let Some(file) = &self.config.file {
            let (writer, file_guard) = Self::file_writer(file)?;
            layers.push(self.json_layer().with_writer(writer).boxed());
            guard = Some(file_guard);
        }

        Ok((layers, guard))
    }

    /// Install the subscriber globally
    ///
    /// Keep the returned guard alive for as long as file output is needed.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));
        let (layers, guard) = self.layers()?;

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }
}

impl Default for BellhopSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    BellhopSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    BellhopSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests; repeated calls are harmless
pub fn init_testing() {
    let _ = BellhopSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_jsonl() {
        let builder = BellhopSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = BellhopSubscriberBuilder::new()
            .with_config(LogConfig::development())
            .with_level("trace")
            .with_console(false);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_layers_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let builder = BellhopSubscriberBuilder::new().with_file_output(FileConfig {
            directory: dir.path().to_path_buf(),
            prefix: "run".to_string(),
            rotation: RotationStrategy::Never,
        });

        let (layers, guard) = builder.layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert!(guard.is_some());
        assert!(dir.path().join("run.log").exists());

        let (layers, guard) = BellhopSubscriberBuilder::new()
            .with_console(false)
            .layers()
            .unwrap();
        assert!(layers.is_empty());
        assert!(guard.is_none());
    }

    #[test]
    fn test_uncreatable_log_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        for (rotation, daily) in [(RotationStrategy::Daily, true), (RotationStrategy::Never, false)] {
            let builder = BellhopSubscriberBuilder::new().with_file_output(FileConfig {
                directory: blocker.join("logs"),
                prefix: "run".to_string(),
                rotation,
            });
            match builder.layers() {
                Err(LoggingError::Appender(_)) => assert!(daily),
                Err(LoggingError::Io(_)) => assert!(!daily),
                Err(e) => panic!("unexpected error {}", e),
                Ok(_) => panic!("log directory under a file was accepted"),
            }
        }
    }

    #[test]
    fn test_second_init_is_reported() {
        init_testing();
        let second = BellhopSubscriberBuilder::new()
            .with_config(LogConfig::testing())
            .try_init();
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
    }
}
