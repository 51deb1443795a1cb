//! Correlation ids for tool calls
//!
//! An interaction and the completion it eventually produces run in different
//! tasks. A [`CorrelationContext`] created when the call is issued is recorded
//! on both sides so the two log lines can be joined.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation context for one interaction and its tool calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// Root trace id, shared by every call caused by one interaction
    pub trace_id: Uuid,

    /// Unique to this operation
    pub span_id: Uuid,

    /// Links this span to the operation that caused it
    pub parent_span_id: Option<Uuid>,

    /// Dispatcher call id, once one has been assigned
    pub call_id: Option<u64>,

    /// Tool being invoked
    pub tool_id: Option<String>,
}

impl CorrelationContext {
    /// Create a new root context (at the interaction)
    pub fn new_root() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            call_id: None,
            tool_id: None,
        }
    }

    /// Create a child context linked to this one
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            call_id: self.call_id,
            tool_id: self.tool_id.clone(),
        }
    }

    pub fn with_call(mut self, call_id: u64, tool_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id);
        self.tool_id = Some(tool_id.into());
        self
    }

    pub fn trace_id_str(&self) -> String {
        self.trace_id.to_string()
    }

    pub fn span_id_str(&self) -> String {
        self.span_id.to_string()
    }

    /// Convert to W3C trace context format (traceparent header)
    ///
    /// Format: `00-{trace_id}-{span_id}-{flags}`
    pub fn to_traceparent(&self) -> String {
        let trace_id_hex = self.trace_id.as_simple().to_string();
        let span_id_hex = &self.span_id.as_simple().to_string()[..16];
        format!("00-{}-{}-01", trace_id_hex, span_id_hex)
    }

    /// Parse from W3C trace context format
    pub fn from_traceparent(traceparent: &str) -> Option<Self> {
        let parts: Vec<&str> = traceparent.split('-').collect();
        if parts.len() != 4 {
            return None;
        }

        let trace_id = Uuid::parse_str(parts[1]).ok()?;
        let span_id_padded = format!("{}0000000000000000", parts[2]);
        let span_id = Uuid::parse_str(&span_id_padded).ok()?;

        Some(Self {
            trace_id,
            span_id,
            parent_span_id: None,
            call_id: None,
            tool_id: None,
        })
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new_root()
    }
}

/// Helper trait to attach correlation context to tracing spans
pub trait CorrelationExt {
    /// Record correlation fields on a span
    fn record_correlation(&self, ctx: &CorrelationContext);
}

impl CorrelationExt for tracing::Span {
    fn record_correlation(&self, ctx: &CorrelationContext) {
        self.record(fields::TRACE_ID, ctx.trace_id_str());
        self.record(fields::SPAN_ID, ctx.span_id_str());
        if let Some(parent) = ctx.parent_span_id {
            self.record(fields::PARENT_SPAN_ID, parent.to_string());
        }
        if let Some(call_id) = ctx.call_id {
            self.record(fields::CALL_ID, call_id);
        }
        if let Some(ref tool_id) = ctx.tool_id {
            self.record(fields::TOOL_ID, tool_id.as_str());
        }
    }
}

/// Standard field names
pub mod fields {
    pub const TRACE_ID: &str = "trace_id";
    pub const SPAN_ID: &str = "span_id";
    pub const PARENT_SPAN_ID: &str = "parent_span_id";
    pub const CALL_ID: &str = "call_id";
    pub const TOOL_ID: &str = "tool_id";
    pub const WINDOW_ID: &str = "window_id";
    pub const APP_ID: &str = "app_id";
    pub const COMPONENT_ID: &str = "component_id";
    pub const LATENCY_MS: &str = "latency_ms";
}

/// Standard span names
pub mod spans {
    pub const RENDER_PASS: &str = "render_pass";
    pub const TOOL_CALL: &str = "tool_call";
    pub const LOCAL_TOOL: &str = "local_tool";
    pub const HANDLE_EVENT: &str = "handle_event";
    pub const PUMP: &str = "pump";
    pub const WINDOW_OPEN: &str = "window_open";
    pub const WINDOW_CLOSE: &str = "window_close";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_root_context() {
        let ctx = CorrelationContext::new_root();
        assert!(ctx.parent_span_id.is_none());
        assert!(ctx.call_id.is_none());
    }

    #[test]
    fn test_child_context() {
        let root = CorrelationContext::new_root().with_call(7, "calc.add");
        let child = root.child();

        assert_eq!(child.trace_id, root.trace_id);
        assert_ne!(child.span_id, root.span_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
        assert_eq!(child.call_id, Some(7));
        assert_eq!(child.tool_id.as_deref(), Some("calc.add"));
    }

    #[test]
    fn test_traceparent_roundtrip() {
        let ctx = CorrelationContext::new_root();
        let traceparent = ctx.to_traceparent();
        assert!(traceparent.starts_with("00-"));

        let parsed = CorrelationContext::from_traceparent(&traceparent).unwrap();
        assert_eq!(parsed.trace_id, ctx.trace_id);
        assert!(CorrelationContext::from_traceparent("garbage").is_none());
    }
}
