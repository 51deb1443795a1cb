//! Error types for Spectral

use thiserror::Error;

/// Stable error codes carried by [`ToolError::Execution`]
pub mod codes {
    pub const DISPOSED: &str = "DISPOSED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    pub const UNBOUND_APP: &str = "UNBOUND_APP";
    pub const TRANSPORT: &str = "TRANSPORT";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Top-level error type for Spectral
#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Blueprint error: {0}")]
    Blueprint(#[from] BlueprintError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Problems with a single node of a received specification
///
/// These never propagate past the node that produced them; the renderer
/// replaces the node with a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Unknown component type: {0}")]
    UnknownType(String),

    #[error("Malformed node: {0}")]
    Malformed(String),

    #[error("Nesting depth exceeds limit of {max}")]
    DepthExceeded { max: usize },

    #[error("Invalid prop '{prop}': {reason}")]
    InvalidProp { prop: String, reason: String },

    #[error("Invalid spec JSON: {0}")]
    InvalidJson(String),
}

/// Failure of a single tool call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Tool '{tool_id}' failed [{code}]: {message}")]
    Execution {
        tool_id: String,
        code: String,
        message: String,
    },

    #[error("Dispatcher disposed, '{tool_id}' was not executed")]
    Disposed { tool_id: String },
}

impl ToolError {
    /// Create an execution error with a code and message
    pub fn execution(
        tool_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ToolError::Execution {
            tool_id: tool_id.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a disposed-state error
    pub fn disposed(tool_id: impl Into<String>) -> Self {
        ToolError::Disposed {
            tool_id: tool_id.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(tool_id: impl Into<String>, after_ms: u64) -> Self {
        Self::execution(
            tool_id,
            codes::TIMEOUT,
            format!("no result after {after_ms}ms"),
        )
    }

    /// Create an unknown-tool error
    pub fn unknown_tool(tool_id: impl Into<String>) -> Self {
        let tool_id = tool_id.into();
        let message = format!("no handler registered for '{tool_id}'");
        Self::execution(tool_id, codes::UNKNOWN_TOOL, message)
    }

    /// Create an invalid-params error
    pub fn invalid_params(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::execution(tool_id, codes::INVALID_PARAMS, message)
    }

    /// Stable code for this error
    pub fn code(&self) -> &str {
        match self {
            ToolError::Execution { code, .. } => code,
            ToolError::Disposed { .. } => codes::DISPOSED,
        }
    }

    /// Human-readable message without the tool id prefix
    pub fn message(&self) -> String {
        match self {
            ToolError::Execution { message, .. } => message.clone(),
            ToolError::Disposed { .. } => "dispatcher has been cleaned up".to_string(),
        }
    }

    /// The tool this error belongs to
    pub fn tool_id(&self) -> &str {
        match self {
            ToolError::Execution { tool_id, .. } | ToolError::Disposed { tool_id } => tool_id,
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, ToolError::Disposed { .. })
    }
}

/// Errors in the window/instance lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Window {window_id} is bound to app '{bound}', refusing '{requested}'")]
    AppIdMismatch {
        window_id: String,
        bound: String,
        requested: String,
    },

    #[error("App id already bound to '{bound}', refusing '{requested}'")]
    AppIdAlreadyBound { bound: String, requested: String },

    #[error("Window not found: {0}")]
    UnknownWindow(String),
}

/// Errors while expanding a blueprint document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object")]
    NotAnObject,

    #[error("Missing '{0}' section")]
    MissingSection(String),

    #[error("{0} is required")]
    MissingField(String),
}

/// Errors in runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Result type alias for Spectral operations
pub type SpectralResult<T> = Result<T, SpectralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::UnknownType("hologram".to_string());
        assert!(format!("{}", err).contains("Unknown component type"));
        assert!(format!("{}", err).contains("hologram"));

        let err = SpecError::DepthExceeded { max: 64 };
        assert!(format!("{}", err).contains("64"));

        let err = SpecError::InvalidProp {
            prop: "itemHeight".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("itemHeight"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn test_tool_error_codes() {
        let err = ToolError::execution("calc.add", "BACKEND", "boom");
        assert_eq!(err.code(), "BACKEND");
        assert_eq!(err.message(), "boom");
        assert_eq!(err.tool_id(), "calc.add");
        assert!(!err.is_disposed());

        let err = ToolError::disposed("calc.add");
        assert_eq!(err.code(), codes::DISPOSED);
        assert!(err.is_disposed());

        let err = ToolError::timeout("slow.op", 250);
        assert_eq!(err.code(), codes::TIMEOUT);
        assert!(err.message().contains("250"));

        assert_eq!(ToolError::unknown_tool("x.y").code(), codes::UNKNOWN_TOOL);
        assert_eq!(
            ToolError::invalid_params("x.y", "missing a").code(),
            codes::INVALID_PARAMS
        );
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::execution("calc.div", "DIVISION_BY_ZERO", "cannot divide by zero");
        let msg = format!("{}", err);
        assert!(msg.contains("calc.div"));
        assert!(msg.contains("DIVISION_BY_ZERO"));

        let msg = format!("{}", ToolError::disposed("calc.add"));
        assert!(msg.contains("disposed"));
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::AppIdMismatch {
            window_id: "W1".to_string(),
            bound: "calc".to_string(),
            requested: "notes".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("W1"));
        assert!(msg.contains("calc"));
        assert!(msg.contains("notes"));
    }

    #[test]
    fn test_error_conversions() {
        let err: SpectralError = SpecError::Malformed("x".to_string()).into();
        assert!(matches!(err, SpectralError::Spec(_)));

        let err: SpectralError = ToolError::disposed("t").into();
        assert!(matches!(err, SpectralError::Tool(_)));

        let err: SpectralError = LifecycleError::UnknownWindow("W9".to_string()).into();
        assert!(matches!(err, SpectralError::Lifecycle(_)));

        let err: SpectralError = BlueprintError::NotAnObject.into();
        assert!(matches!(err, SpectralError::Blueprint(_)));

        let err: SpectralError = ConfigError::Parse("bad".to_string()).into();
        assert!(matches!(err, SpectralError::Config(_)));
        assert!(format!("{}", err).contains("Config error"));
    }
}
