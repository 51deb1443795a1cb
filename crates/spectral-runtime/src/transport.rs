//! In-process tool transport
//!
//! Handlers are plain closures keyed by tool id. Used by the CLI and by
//! tests; a networked transport implements [`ToolTransport`] the same way.
//!
//! ```rust,ignore
//! let transport = InMemoryTransport::with_calculator();
//! transport.register_sync("notes.count", |_| Ok(json!(0)));
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Number, Value};
use spectral_core::ToolError;

use crate::dispatcher::{CallOutcome, ToolRequest, ToolTransport};

type Handler = Arc<dyn Fn(ToolRequest) -> BoxFuture<'static, CallOutcome> + Send + Sync>;

/// Transport that runs registered handlers in the current process
pub struct InMemoryTransport {
    handlers: DashMap<String, Handler>,
    calls: Mutex<Vec<ToolRequest>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Transport preloaded with `calc.add`, `calc.sub`, `calc.mul` and `calc.div`
    pub fn with_calculator() -> Self {
        let transport = Self::new();
        transport.register_sync("calc.add", |req| binary_op(req, |a, b| Ok(a + b)));
        transport.register_sync("calc.sub", |req| binary_op(req, |a, b| Ok(a - b)));
        transport.register_sync("calc.mul", |req| binary_op(req, |a, b| Ok(a * b)));
        transport.register_sync("calc.div", |req| {
            binary_op(req, |a, b| {
                if b == 0.0 {
                    Err(("DIVISION_BY_ZERO", "cannot divide by zero"))
                } else {
                    Ok(a / b)
                }
            })
        });
        transport
    }

    /// Register an async handler, replacing any previous one for `tool_id`
    pub fn register<F, Fut>(&self, tool_id: impl Into<String>, handler: F)
    where
        F: Fn(ToolRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallOutcome> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |request: ToolRequest| -> BoxFuture<'static, CallOutcome> {
                Box::pin(handler(request))
            });
        self.handlers.insert(tool_id.into(), handler);
    }

    /// Register a handler that completes immediately
    pub fn register_sync<F>(&self, tool_id: impl Into<String>, handler: F)
    where
        F: Fn(&ToolRequest) -> CallOutcome + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(tool_id, move |request: ToolRequest| {
            let outcome = handler(&request);
            async move { outcome }
        });
    }

    pub fn has_tool(&self, tool_id: &str) -> bool {
        self.handlers.contains_key(tool_id)
    }

    /// Every request received so far, in arrival order
    pub fn calls(&self) -> Vec<ToolRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for InMemoryTransport {
    async fn call(&self, request: ToolRequest) -> CallOutcome {
        self.calls.lock().push(request.clone());

        // Clone out of the map so no shard lock is held across the await
        let handler = self
            .handlers
            .get(&request.tool_id)
            .map(|entry| Arc::clone(entry.value()));

        match handler {
            Some(handler) => handler(request).await,
            None => Err(ToolError::unknown_tool(request.tool_id)),
        }
    }
}

fn binary_op<F>(request: &ToolRequest, op: F) -> CallOutcome
where
    F: Fn(f64, f64) -> Result<f64, (&'static str, &'static str)>,
{
    let operand = |name: &str| {
        request
            .params
            .get(name)
            .and_then(numeric)
            .ok_or_else(|| {
                ToolError::invalid_params(&request.tool_id, format!("'{name}' must be a number"))
            })
    };
    let a = operand("a")?;
    let b = operand("b")?;
    match op(a, b) {
        Ok(result) => Ok(number_value(result)),
        Err((code, message)) => Err(ToolError::execution(&request.tool_id, code, message)),
    }
}

/// Accept numbers and numeric strings, as display values are strings
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whole results become JSON integers so `1 + 2` yields `3`, not `3.0`
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}
