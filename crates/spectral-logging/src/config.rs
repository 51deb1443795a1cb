//! Logging configuration and named presets

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Names accepted by [`LogConfig::preset`]
pub const PRESETS: &[&str] = &["default", "development", "testing", "calls"];

/// Logging configuration
///
/// Deserializable so hosts can embed it as a `[log]` table in their own
/// TOML config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level; `RUST_LOG` replaces the whole filter when set
    pub level: String,
    /// Extra `target=level` filter directives
    pub directives: Vec<String>,
    pub console: ConsoleFormat,
    /// ANSI colors for pretty console output
    pub ansi: bool,
    pub file: Option<FileConfig>,
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            console: ConsoleFormat::Jsonl,
            ansi: false,
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Pretty, colored console output at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleFormat::Pretty,
            ansi: true,
            ..Default::default()
        }
    }

    /// JSONL into a daily-rotated file under `log_dir`, nothing on the console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleFormat::Off,
            file: Some(FileConfig {
                directory: log_dir,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Warnings only, plain text
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleFormat::Pretty,
            ..Default::default()
        }
    }

    /// Follow every tool call and its completion, quiet elsewhere
    pub fn calls() -> Self {
        Self {
            level: "warn".to_string(),
            directives: vec![
                "spectral_runtime::dispatcher=debug".to_string(),
                "spectral_runtime::host=debug".to_string(),
            ],
            console: ConsoleFormat::Pretty,
            ..Default::default()
        }
    }

    /// Look up one of [`PRESETS`] (`dev` and `test` are accepted as aliases)
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "development" | "dev" => Some(Self::development()),
            "testing" | "test" => Some(Self::testing()),
            "calls" => Some(Self::calls()),
            _ => None,
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// The `EnvFilter` string: the base level followed by every directive
    pub fn filter(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// How events are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    Off,
    Pretty,
    #[default]
    Jsonl,
}

/// File output; always JSONL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "spectral".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated on start
    Never,
}

/// Shape of JSONL records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Include the enclosing spans (`render_pass`, `tool_call`, ...)
    pub include_spans: bool,
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: false,
        }
    }
}
