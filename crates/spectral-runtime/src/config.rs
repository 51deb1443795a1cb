//! Runtime configuration

use serde::{Deserialize, Serialize};
use spectral_core::ConfigError;

/// Configuration shared by every window a host opens
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub virtualization: VirtualizationConfig,
    pub render: RenderConfig,
    pub dispatch: DispatchConfig,
}

impl RuntimeConfig {
    /// Parse a TOML document; missing sections and fields take defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_virtualization(mut self, virtualization: VirtualizationConfig) -> Self {
        self.virtualization = virtualization;
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.virtualization;
        if v.threshold == 0 {
            return Err(invalid("virtualization.threshold", "must be at least 1"));
        }
        if !(v.item_height.is_finite() && v.item_height > 0.0) {
            return Err(invalid("virtualization.item_height", "must be a positive number"));
        }
        if !(v.viewport_height.is_finite() && v.viewport_height > 0.0) {
            return Err(invalid("virtualization.viewport_height", "must be a positive number"));
        }
        if self.render.max_depth == 0 {
            return Err(invalid("render.max_depth", "must be at least 1"));
        }
        if self.dispatch.call_timeout_ms == Some(0) {
            return Err(invalid("dispatch.call_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Virtualized list settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualizationConfig {
    /// Lists with at least this many children are windowed
    pub threshold: usize,
    /// Fixed height of one item, in pixels
    pub item_height: f64,
    /// Height of the visible area, in pixels
    pub viewport_height: f64,
    /// Extra items mounted above and below the visible range
    pub overscan: usize,
}

impl Default for VirtualizationConfig {
    fn default() -> Self {
        Self {
            threshold: 30,
            item_height: 40.0,
            viewport_height: 480.0,
            overscan: 3,
        }
    }
}

impl VirtualizationConfig {
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_item_height(mut self, item_height: f64) -> Self {
        self.item_height = item_height;
        self
    }

    pub fn with_viewport_height(mut self, viewport_height: f64) -> Self {
        self.viewport_height = viewport_height;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }
}

/// Render pass limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Nodes nested deeper than this render as placeholders
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Tool dispatch settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-call timeout; `None` waits for the transport indefinitely
    pub call_timeout_ms: Option<u64>,
}

impl DispatchConfig {
    pub fn with_call_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.call_timeout_ms = Some(timeout_ms);
        self
    }
}
