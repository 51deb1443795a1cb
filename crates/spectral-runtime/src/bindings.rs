//! Event bindings
//!
//! A render pass turns every `on_event` entry into a [`BoundEvent`] holding
//! the window's state and dispatcher. Firing one either runs a local `ui.*`
//! tool on the spot or submits a remote call whose completion is posted to
//! the window's queue as a [`WindowMessage`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use spectral_core::{Props, ToolInvocation};
use tokio::sync::mpsc;

use crate::dispatcher::{CallHandle, CallId, CallOutcome, ToolDispatcher};
use crate::state::StateStore;
use crate::transport::InMemoryTransport;
use crate::ui_tools::{self, LocalCall};

/// Message posted to a window's queue
#[derive(Debug, Clone)]
pub enum WindowMessage {
    /// A remote call fired by `component_id` settled
    ToolSettled {
        component_id: String,
        event: String,
        call_id: CallId,
        /// Where a successful result is written
        result_key: String,
        outcome: CallOutcome,
    },
}

/// The window resources an event handler may touch
#[derive(Clone)]
pub struct EventScope {
    pub state: Arc<StateStore>,
    pub dispatcher: Arc<ToolDispatcher>,
    completions: mpsc::UnboundedSender<WindowMessage>,
}

impl EventScope {
    pub fn new(
        state: Arc<StateStore>,
        dispatcher: Arc<ToolDispatcher>,
        completions: mpsc::UnboundedSender<WindowMessage>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            completions,
        }
    }

    /// A scope with fresh state and an empty in-memory transport, outside
    /// any registry
    pub fn detached(app_id: &str) -> (Self, mpsc::UnboundedReceiver<WindowMessage>) {
        let dispatcher = ToolDispatcher::new(Arc::new(InMemoryTransport::new()));
        // A fresh dispatcher has nothing bound yet
        let _ = dispatcher.set_app_id(app_id);
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self::new(Arc::new(StateStore::new()), Arc::new(dispatcher), tx),
            rx,
        )
    }
}

/// What firing an event did
#[derive(Debug)]
pub enum EventOutcome {
    /// A `ui.*` tool ran synchronously
    Local(CallOutcome),
    /// A remote call was started; its result arrives as a [`WindowMessage`]
    Remote(CallHandle),
}

/// One event of one component, ready to fire
#[derive(Clone)]
pub struct BoundEvent {
    pub component_id: String,
    pub event: String,
    pub invocation: ToolInvocation,
    component_props: Props,
    scope: EventScope,
}

impl BoundEvent {
    pub fn new(
        component_id: String,
        event: String,
        invocation: ToolInvocation,
        component_props: Props,
        scope: EventScope,
    ) -> Self {
        Self {
            component_id,
            event,
            invocation,
            component_props,
            scope,
        }
    }

    /// State key a successful remote result is written to
    ///
    /// `params.resultKey` when given, else `"{componentId}:result"`.
    pub fn result_key(&self) -> String {
        self.invocation
            .params
            .get("resultKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:result", self.component_id))
    }

    /// Fire the event
    ///
    /// Remote calls are spawned on the current tokio runtime and never
    /// awaited here.
    pub fn fire(&self, payload: Option<Value>) -> EventOutcome {
        let tool_id = self.invocation.tool_id.as_str();

        if ui_tools::is_local(tool_id) {
            let _span = tracing::debug_span!(
                "local_tool",
                component_id = %self.component_id,
                tool_id = %tool_id
            )
            .entered();
            let outcome = ui_tools::apply(
                &self.scope.state,
                &LocalCall {
                    invocation: &self.invocation,
                    component_id: &self.component_id,
                    component_props: &self.component_props,
                    payload: payload.as_ref(),
                },
            );
            if let Err(e) = &outcome {
                tracing::debug!(error = %e, "Local tool failed");
            }
            return EventOutcome::Local(outcome);
        }

        let result_key = self.result_key();
        let mut invocation = self.invocation.clone();
        invocation.params.remove("resultKey");
        if let Some(payload) = payload {
            invocation.params.insert("payload".to_string(), payload);
        }

        let completions = self.scope.completions.clone();
        let component_id = self.component_id.clone();
        let event = self.event.clone();
        let handle = self
            .scope
            .dispatcher
            .submit(invocation, move |call_id, outcome| {
                let message = WindowMessage::ToolSettled {
                    component_id,
                    event,
                    call_id,
                    result_key,
                    outcome: outcome.clone(),
                };
                if completions.send(message).is_err() {
                    tracing::debug!(call_id, "Window closed before completion arrived");
                }
            });

        tracing::debug!(
            component_id = %self.component_id,
            event = %self.event,
            tool_id = %tool_id,
            call_id = handle.call_id,
            "Submitted tool call"
        );
        EventOutcome::Remote(handle)
    }
}

impl std::fmt::Debug for BoundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundEvent")
            .field("component_id", &self.component_id)
            .field("event", &self.event)
            .field("tool_id", &self.invocation.tool_id)
            .finish()
    }
}

/// `(componentId, event)` → binding, for one render pass
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: BTreeMap<(String, String), BoundEvent>,
}

impl BindingTable {
    /// Add a binding; a later binding for the same pair replaces the earlier
    pub fn insert(&mut self, bound: BoundEvent) {
        let key = (bound.component_id.clone(), bound.event.clone());
        if self.entries.insert(key, bound).is_some() {
            tracing::debug!("Replaced binding for duplicate component id");
        }
    }

    pub fn get(&self, component_id: &str, event: &str) -> Option<&BoundEvent> {
        self.entries
            .get(&(component_id.to_string(), event.to_string()))
    }

    /// Events bound on one component
    pub fn events_for(&self, component_id: &str) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|(id, _)| id == component_id)
            .map(|(_, event)| event.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
