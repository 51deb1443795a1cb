//! Structured logging for the Spectral window runtime
//!
//! Every window renders and routes events on behalf of one app, and tool
//! calls complete on other tasks long after the click that caused them.
//! This crate gives each log line enough context to put that story back
//! together.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines by default
//! - **Window Context**: `window_id` / `app_id` attached to spans via [`WindowContextGuard`]
//! - **Call Correlation**: [`CorrelationContext`] joins an interaction to its completion
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use spectral_logging::{LogConfig, SpectralSubscriberBuilder};
//!
//! // JSONL to console
//! SpectralSubscriberBuilder::new().init();
//!
//! // Human-readable output while developing
//! SpectralSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod context;
pub mod correlation;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, JsonlConfig, LogConfig, PRESETS, RotationStrategy};
pub use context::{WindowContextData, WindowContextGuard};
pub use correlation::{CorrelationContext, CorrelationExt, fields, spans};
pub use layers::{WindowContextExtension, WindowContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("failed to open log output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create rolling appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}

/// Builder for configuring and initializing the Spectral logging subscriber
///
/// Console output is JSONL unless the config asks for pretty output. File
/// output, when configured, is always JSONL.
pub struct SpectralSubscriberBuilder {
    config: LogConfig,
}

impl SpectralSubscriberBuilder {
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

    /// Set the base log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally
    ///
    /// The returned guard flushes the file writer on drop and must be kept
    /// alive for the lifetime of the program. Failures are reported on
    /// stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogInitError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter()));

        let jsonl = &self.config.jsonl;
        let console = self.config.console;

        let (file_writer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = create_file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let pretty_console = (console == ConsoleFormat::Pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(self.config.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
        });

        let json_console = (console == ConsoleFormat::Jsonl).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .with_writer(std::io::stderr)
        });

        let file_layer = file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .with_writer(writer)
        });

        Registry::default()
            .with(env_filter)
            .with(WindowContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|_| LogInitError::AlreadyInstalled)?;

        Ok(guard)
    }
}

impl Default for SpectralSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-file output truncates on start; rotating output appends.
fn create_file_writer(
    file_config: &FileConfig,
) -> Result<(NonBlocking, WorkerGuard), LogInitError> {
    fs::create_dir_all(&file_config.directory)?;
    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let path = file_config
                .directory
                .join(format!("{}.jsonl", file_config.prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("jsonl")
        .build(&file_config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() {
    SpectralSubscriberBuilder::new().init();
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() {
    SpectralSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for tests; safe to call more than once
pub fn init_testing() {
    let _ = SpectralSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = SpectralSubscriberBuilder::new();
        assert_eq!(builder.config().level, "info");
        assert_eq!(builder.config().console, ConsoleFormat::Jsonl);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = SpectralSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().level, "debug");
        assert_eq!(builder.config().console, ConsoleFormat::Pretty);
    }

    #[test]
    fn test_builder_with_level_and_console() {
        let builder = SpectralSubscriberBuilder::new()
            .with_level("trace")
            .with_console(ConsoleFormat::Off);
        assert_eq!(builder.config().level, "trace");
        assert_eq!(builder.config().console, ConsoleFormat::Off);
    }

    #[test]
    fn test_single_file_writer_creates_file() {
        let dir = std::env::temp_dir().join(format!("spectral-log-{}", uuid::Uuid::new_v4()));
        let config = FileConfig {
            directory: dir.clone(),
            prefix: "unit".to_string(),
            rotation: RotationStrategy::Never,
        };
        let (_writer, _guard) = create_file_writer(&config).unwrap();
        assert!(dir.join("unit.jsonl").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
    }
}
