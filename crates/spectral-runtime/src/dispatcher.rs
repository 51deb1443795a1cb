//! Tool dispatcher
//!
//! Executes `(toolId, params)` pairs against one window's fixed app context.
//! Calls are independent: nothing is deduplicated, queued or retried here.
//! After [`ToolDispatcher::cleanup`] every call, new or in flight, resolves to
//! [`ToolError::Disposed`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use spectral_core::{LifecycleError, Props, ToolError, ToolInvocation, codes};
use spectral_logging::{CorrelationContext, CorrelationExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, field};

use crate::config::DispatchConfig;

/// Dispatcher-local call identifier
pub type CallId = u64;

/// Result of one tool call
pub type CallOutcome = Result<Value, ToolError>;

/// What the transport receives for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub call_id: CallId,
    pub app_id: String,
    pub tool_id: String,
    pub params: Props,
    /// W3C `traceparent` of the `tool_call` span, for backends that log
    pub traceparent: String,
}

/// Carries tool calls to whatever executes them
///
/// Implementations report backend failures as [`ToolError::Execution`] with
/// a code and message. They never see calls made after cleanup.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call(&self, request: ToolRequest) -> CallOutcome;
}

#[derive(Debug)]
struct PendingCall {
    tool_id: String,
    started: Instant,
}

/// Handle to a call started with [`ToolDispatcher::submit`]
#[derive(Debug)]
pub struct CallHandle {
    pub call_id: CallId,
    pub tool_id: String,
    task: CallTask,
}

#[derive(Debug)]
enum CallTask {
    Spawned(JoinHandle<CallOutcome>),
    /// Settled without ever being spawned
    Rejected(ToolError),
}

impl CallHandle {
    pub fn is_finished(&self) -> bool {
        match &self.task {
            CallTask::Spawned(task) => task.is_finished(),
            CallTask::Rejected(_) => true,
        }
    }

    /// Wait for the call to settle
    pub async fn outcome(self) -> CallOutcome {
        let task = match self.task {
            CallTask::Spawned(task) => task,
            CallTask::Rejected(e) => return Err(e),
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(ToolError::execution(
                self.tool_id,
                codes::INTERNAL,
                format!("call task failed: {e}"),
            )),
        }
    }
}

/// Executes tool calls for one window
pub struct ToolDispatcher {
    transport: Arc<dyn ToolTransport>,
    app_id: OnceLock<String>,
    cancel: CancellationToken,
    pending: DashMap<CallId, PendingCall>,
    next_call: AtomicU64,
    call_timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self::with_config(transport, &DispatchConfig::default())
    }

    pub fn with_config(transport: Arc<dyn ToolTransport>, config: &DispatchConfig) -> Self {
        Self {
            transport,
            app_id: OnceLock::new(),
            cancel: CancellationToken::new(),
            pending: DashMap::new(),
            next_call: AtomicU64::new(1),
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Bind the app context
    ///
    /// The first bind wins. Binding the same id again is a no-op; any other
    /// id is refused.
    pub fn set_app_id(&self, app_id: impl Into<String>) -> Result<(), LifecycleError> {
        let app_id = app_id.into();
        match self.app_id.set(app_id) {
            Ok(()) => Ok(()),
            Err(requested) => match self.app_id.get() {
                Some(bound) if *bound == requested => Ok(()),
                Some(bound) => Err(LifecycleError::AppIdAlreadyBound {
                    bound: bound.clone(),
                    requested,
                }),
                None => Ok(()),
            },
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.get().map(String::as_str)
    }

    /// Execute a tool against the bound app
    pub async fn execute(&self, tool_id: impl Into<String>, params: Props) -> CallOutcome {
        let invocation = ToolInvocation::new(tool_id).with_params(params);
        self.execute_invocation(&invocation).await
    }

    /// Execute a spec-supplied invocation, honoring its app id override
    pub async fn execute_invocation(&self, invocation: &ToolInvocation) -> CallOutcome {
        let call_id = self.next_call_id();
        self.run(call_id, invocation.clone()).await
    }

    /// Start a call without waiting for it
    ///
    /// `on_settle` runs on the call's task once the outcome is known,
    /// including when the outcome is [`ToolError::Disposed`]. Outside a
    /// tokio runtime the call is not started: `on_settle` runs immediately
    /// with an `INTERNAL` error.
    pub fn submit<F>(self: &Arc<Self>, invocation: ToolInvocation, on_settle: F) -> CallHandle
    where
        F: FnOnce(CallId, &CallOutcome) + Send + 'static,
    {
        let call_id = self.next_call_id();
        let tool_id = invocation.tool_id.clone();

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(call_id, tool_id = %tool_id, "No async runtime; tool call not started");
            let error = ToolError::execution(
                tool_id.clone(),
                codes::INTERNAL,
                "no async runtime to run the call on",
            );
            on_settle(call_id, &Err(error.clone()));
            return CallHandle {
                call_id,
                tool_id,
                task: CallTask::Rejected(error),
            };
        };

        let dispatcher = Arc::clone(self);
        let task = CallTask::Spawned(runtime.spawn(async move {
            let outcome = dispatcher.run(call_id, invocation).await;
            on_settle(call_id, &outcome);
            outcome
        }));
        CallHandle {
            call_id,
            tool_id,
            task,
        }
    }

    /// Abandon pending calls and refuse all further ones
    ///
    /// In-flight calls resolve to [`ToolError::Disposed`]; whatever the
    /// transport was doing on the remote side is not undone.
    pub fn cleanup(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let abandoned = self.pending.len();
        self.pending.clear();
        tracing::debug!(
            app_id = self.app_id().unwrap_or_default(),
            abandoned,
            "Dispatcher cleaned up"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Calls started and not yet settled
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_call_id(&self) -> CallId {
        self.next_call.fetch_add(1, Ordering::Relaxed)
    }

    async fn run(&self, call_id: CallId, invocation: ToolInvocation) -> CallOutcome {
        let tool_id = invocation.tool_id;

        if self.cancel.is_cancelled() {
            tracing::debug!(call_id, tool_id = %tool_id, "Rejecting call on disposed dispatcher");
            return Err(ToolError::disposed(tool_id));
        }

        let Some(app_id) = invocation.app_id.or_else(|| self.app_id.get().cloned()) else {
            return Err(ToolError::execution(
                tool_id,
                codes::UNBOUND_APP,
                "no app id bound and none supplied",
            ));
        };

        let correlation = CorrelationContext::new_root().with_call(call_id, &tool_id);
        let span = tracing::info_span!(
            "tool_call",
            call_id,
            tool_id = %tool_id,
            app_id = %app_id,
            trace_id = field::Empty,
            span_id = field::Empty,
        );
        span.record_correlation(&correlation);

        self.pending.insert(
            call_id,
            PendingCall {
                tool_id: tool_id.clone(),
                started: Instant::now(),
            },
        );

        let request = ToolRequest {
            call_id,
            app_id,
            tool_id: tool_id.clone(),
            params: invocation.params,
            traceparent: correlation.to_traceparent(),
        };

        let outcome = async {
            tracing::debug!("Dispatching tool call");
            let call = self.transport.call(request);
            let bounded = async {
                match self.call_timeout {
                    Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                        Err(ToolError::timeout(&tool_id, limit.as_millis() as u64))
                    }),
                    None => call.await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ToolError::disposed(&tool_id)),
                outcome = bounded => outcome,
            }
        }
        .instrument(span.clone())
        .await;

        let latency_ms = self
            .pending
            .remove(&call_id)
            .map(|(_, pending)| pending.started.elapsed().as_millis() as u64);

        let _entered = span.enter();
        match &outcome {
            Ok(_) => tracing::debug!(latency_ms, "Tool call resolved"),
            Err(e) if e.is_disposed() => tracing::debug!("Tool call abandoned by cleanup"),
            Err(e) => tracing::warn!(code = e.code(), error = %e, latency_ms, "Tool call failed"),
        }

        outcome
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("app_id", &self.app_id.get())
            .field("disposed", &self.is_disposed())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use serde_json::json;

    fn params(value: Value) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    fn calculator() -> ToolDispatcher {
        let dispatcher = ToolDispatcher::new(Arc::new(InMemoryTransport::with_calculator()));
        dispatcher.set_app_id("calc").unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_execute_resolves() {
        let dispatcher = calculator();
        let result = dispatcher.execute("calc.add", params(json!({"a": 1, "b": 2}))).await;
        assert_eq!(result.unwrap(), json!(3));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_after_cleanup_is_disposed() {
        let dispatcher = calculator();
        dispatcher.cleanup();
        let err = dispatcher
            .execute("calc.add", params(json!({"a": 1, "b": 2})))
            .await
            .unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(err.code(), codes::DISPOSED);
    }

    #[tokio::test]
    async fn test_unbound_app_fails() {
        let dispatcher = ToolDispatcher::new(Arc::new(InMemoryTransport::with_calculator()));
        let err = dispatcher.execute("calc.add", Props::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::UNBOUND_APP);
    }

    #[tokio::test]
    async fn test_app_id_override() {
        let transport = Arc::new(InMemoryTransport::with_calculator());
        let dispatcher = ToolDispatcher::new(transport.clone());
        dispatcher.set_app_id("calc").unwrap();

        let invocation = ToolInvocation::new("calc.add")
            .with_params(params(json!({"a": 2, "b": 2})))
            .with_app_id("scratch");
        dispatcher.execute_invocation(&invocation).await.unwrap();

        assert_eq!(transport.calls()[0].app_id, "scratch");
    }

    #[test]
    fn test_set_app_id_once() {
        let dispatcher = calculator();
        assert!(dispatcher.set_app_id("calc").is_ok());
        assert_eq!(
            dispatcher.set_app_id("notes"),
            Err(LifecycleError::AppIdAlreadyBound {
                bound: "calc".to_string(),
                requested: "notes".to_string(),
            })
        );
        assert_eq!(dispatcher.app_id(), Some("calc"));
    }

    #[tokio::test]
    async fn test_backend_error_surfaces_code() {
        let dispatcher = calculator();
        let err = dispatcher
            .execute("calc.div", params(json!({"a": 1, "b": 0})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DIVISION_BY_ZERO");
        assert_eq!(err.tool_id(), "calc.div");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_abandons_in_flight_call() {
        let transport = InMemoryTransport::new();
        transport.register("slow.echo", |request: ToolRequest| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Object(request.params))
        });
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(transport)));
        dispatcher.set_app_id("echo").unwrap();

        let handle = dispatcher.submit(ToolInvocation::new("slow.echo"), |_, _| {});
        while dispatcher.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        dispatcher.cleanup();
        let err = handle.outcome().await.unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let transport = InMemoryTransport::new();
        transport.register("slow.never", |_request: ToolRequest| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        });
        let dispatcher = ToolDispatcher::with_config(
            Arc::new(transport),
            &DispatchConfig::default().with_call_timeout_ms(100),
        );
        dispatcher.set_app_id("slow").unwrap();

        let err = dispatcher.execute("slow.never", Props::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::TIMEOUT);
    }

    #[tokio::test]
    async fn test_submit_runs_on_settle() {
        let dispatcher = Arc::new(calculator());
        let (tx, rx) = tokio::sync::oneshot::channel();
        let invocation =
            ToolInvocation::new("calc.mul").with_params(params(json!({"a": 6, "b": 7})));

        let handle = dispatcher.submit(invocation, move |call_id, outcome| {
            let _ = tx.send((call_id, outcome.clone()));
        });
        let call_id = handle.call_id;

        let (settled_id, outcome) = rx.await.unwrap();
        assert_eq!(settled_id, call_id);
        assert_eq!(outcome.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_request_carries_traceparent() {
        let transport = Arc::new(InMemoryTransport::with_calculator());
        let dispatcher = ToolDispatcher::new(transport.clone());
        dispatcher.set_app_id("calc").unwrap();
        dispatcher
            .execute("calc.add", params(json!({"a": 1, "b": 1})))
            .await
            .unwrap();

        let calls = transport.calls();
        let parsed = CorrelationContext::from_traceparent(&calls[0].traceparent).unwrap();
        assert_eq!(parsed.trace_id.as_simple().to_string().len(), 32);
        assert_eq!(calls[0].app_id, "calc");
    }

    #[test]
    fn test_submit_outside_runtime_settles_with_internal_error() {
        let dispatcher = Arc::new(calculator());
        let settled = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&settled);

        let invocation =
            ToolInvocation::new("calc.add").with_params(params(json!({"a": 1, "b": 2})));
        let handle = dispatcher.submit(invocation, move |call_id, outcome| {
            *sink.lock() = Some((call_id, outcome.clone()));
        });

        assert!(handle.is_finished());
        let (call_id, outcome) = settled.lock().take().unwrap();
        assert_eq!(call_id, handle.call_id);
        assert_eq!(outcome.unwrap_err().code(), codes::INTERNAL);
        assert_eq!(dispatcher.pending_count(), 0);

        let err = tokio_test::block_on(handle.outcome()).unwrap_err();
        assert_eq!(err.code(), codes::INTERNAL);
    }
}
