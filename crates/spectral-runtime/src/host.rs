//! Window host and per-window sessions
//!
//! [`WindowHost`] turns window lifecycle signals into registry transitions.
//! Each open window gets a [`WindowSession`], which owns the window's
//! message queue and is the single writer for tool results: completions
//! are only applied to state by [`WindowSession::pump`] or
//! [`WindowSession::settle`].

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use spectral_core::{LifecycleError, UiSpec};
use spectral_logging::WindowContextGuard;
use tokio::sync::mpsc;

use crate::bindings::{BindingTable, BoundEvent, EventOutcome, EventScope, WindowMessage};
use crate::config::RuntimeConfig;
use crate::dispatcher::{ToolDispatcher, ToolTransport};
use crate::registry::{InstanceHandle, InstanceRegistry};
use crate::render::{MountedList, RenderOutput, Renderer, scroll_key};
use crate::state::{StateStore, Subscription};

/// Component id lifecycle hooks fire under
pub const LIFECYCLE_COMPONENT_ID: &str = "app";

/// Hook fired once per instance after its first render
pub const ON_MOUNT: &str = "on_mount";

/// How a virtualized list's mounted items changed between two passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountDiff {
    pub mounted: Vec<String>,
    pub unmounted: Vec<String>,
    pub retained: Vec<String>,
}

impl MountDiff {
    fn between(previous: Option<&MountedList>, current: Option<&MountedList>) -> Self {
        let before = previous.map(|l| l.item_ids.as_slice()).unwrap_or_default();
        let after = current.map(|l| l.item_ids.as_slice()).unwrap_or_default();
        let before_set: BTreeSet<&String> = before.iter().collect();
        let after_set: BTreeSet<&String> = after.iter().collect();

        let select = |ids: &[String], set: &BTreeSet<&String>, present: bool| -> Vec<String> {
            ids.iter()
                .filter(|id| set.contains(id) == present)
                .cloned()
                .collect()
        };

        Self {
            mounted: select(after, &before_set, false),
            unmounted: select(before, &after_set, false),
            retained: select(after, &before_set, true),
        }
    }
}

/// One open window: its instance, spec, bindings and message queue
pub struct WindowSession {
    window_id: String,
    app_id: String,
    handle: InstanceHandle,
    spec: UiSpec,
    renderer: Arc<Renderer>,
    scope: EventScope,
    inbox: mpsc::UnboundedReceiver<WindowMessage>,
    bindings: BindingTable,
    read_subscriptions: Vec<Subscription>,
    dirty: Arc<Mutex<BTreeSet<String>>>,
    lists: BTreeMap<String, MountedList>,
    mount_changes: BTreeMap<String, MountDiff>,
    in_flight: usize,
    mounted: bool,
}

impl WindowSession {
    fn new(
        window_id: String,
        app_id: String,
        handle: InstanceHandle,
        spec: UiSpec,
        renderer: Arc<Renderer>,
    ) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        let scope = EventScope::new(
            Arc::clone(&handle.state),
            Arc::clone(&handle.dispatcher),
            tx,
        );
        Self {
            window_id,
            app_id,
            handle,
            spec,
            renderer,
            scope,
            inbox,
            bindings: BindingTable::default(),
            read_subscriptions: Vec::new(),
            dirty: Arc::new(Mutex::new(BTreeSet::new())),
            lists: BTreeMap::new(),
            mount_changes: BTreeMap::new(),
            in_flight: 0,
            mounted: false,
        }
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    pub fn state(&self) -> &StateStore {
        &self.handle.state
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.handle.dispatcher
    }

    pub fn spec(&self) -> &UiSpec {
        &self.spec
    }

    /// Replace the spec used by the next render pass; state is kept
    pub fn set_spec(&mut self, spec: UiSpec) {
        self.spec = spec;
    }

    /// Render the current spec
    ///
    /// Re-subscribes to every state key the pass read, clears the dirty
    /// set, and on the first pass fires the `on_mount` hooks.
    pub fn render(&mut self) -> RenderOutput {
        let _ctx = WindowContextGuard::new(&self.window_id, &self.app_id);
        let mut output = self.renderer.render_spec(&self.spec, &self.scope);

        for subscription in self.read_subscriptions.drain(..) {
            self.handle.state.unsubscribe(&subscription);
        }
        for (key, components) in &output.reads {
            let dirty = Arc::clone(&self.dirty);
            let components: Vec<String> = components.iter().cloned().collect();
            let subscription = self.handle.state.subscribe(key.clone(), move |_, _| {
                dirty.lock().extend(components.iter().cloned());
            });
            self.read_subscriptions.push(subscription);
        }
        self.dirty.lock().clear();

        self.mount_changes = output
            .lists
            .iter()
            .map(|(id, list)| (id.clone(), MountDiff::between(self.lists.get(id), Some(list))))
            .collect();
        self.lists = output.lists.clone();
        self.bindings = std::mem::take(&mut output.bindings);

        if !self.mounted {
            self.mounted = true;
            self.fire_hooks(ON_MOUNT);
        }

        output
    }

    fn fire_hooks(&mut self, hook: &str) {
        let invocations = self.spec.hooks(hook).to_vec();
        for invocation in invocations {
            tracing::debug!(hook, tool_id = %invocation.tool_id, "Firing lifecycle hook");
            let bound = BoundEvent::new(
                LIFECYCLE_COMPONENT_ID.to_string(),
                hook.to_string(),
                invocation,
                Default::default(),
                self.scope.clone(),
            );
            let outcome = bound.fire(None);
            self.track(&outcome);
        }
    }

    /// Route an interaction to its binding
    ///
    /// Returns `None` when the component has no binding for `event` in the
    /// latest render pass.
    pub fn handle_event(
        &mut self,
        component_id: &str,
        event: &str,
        payload: Option<Value>,
    ) -> Option<EventOutcome> {
        let _ctx = WindowContextGuard::new(&self.window_id, &self.app_id);
        let _span = tracing::debug_span!("handle_event", component_id, event).entered();

        let Some(bound) = self.bindings.get(component_id, event) else {
            tracing::debug!("No binding for event");
            return None;
        };
        let outcome = bound.fire(payload);
        self.track(&outcome);
        Some(outcome)
    }

    fn track(&mut self, outcome: &EventOutcome) {
        if matches!(outcome, EventOutcome::Remote(_)) {
            self.in_flight += 1;
        }
    }

    /// Record a list's scroll offset; the list is re-windowed on next render
    pub fn scroll(&mut self, list_id: &str, offset: f64) {
        self.handle.state.set(scroll_key(list_id), json!(offset));
    }

    /// Apply every completion already queued; returns how many were applied
    pub fn pump(&mut self) -> usize {
        let _ctx = WindowContextGuard::new(&self.window_id, &self.app_id);
        let mut applied = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.apply(message);
            applied += 1;
        }
        applied
    }

    /// Wait for every call started by this session to settle and apply it
    pub async fn settle(&mut self) -> usize {
        let mut applied = 0;
        while self.in_flight > 0 {
            let Some(message) = self.inbox.recv().await else {
                break;
            };
            let _ctx = WindowContextGuard::new(&self.window_id, &self.app_id);
            self.apply(message);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, message: WindowMessage) {
        let WindowMessage::ToolSettled {
            component_id,
            event,
            call_id,
            result_key,
            outcome,
        } = message;
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            Ok(value) => {
                tracing::debug!(
                    call_id,
                    component_id = %component_id,
                    result_key = %result_key,
                    "Applying tool result"
                );
                self.handle.state.set(result_key, value);
            }
            Err(e) if e.is_disposed() => {
                tracing::debug!(
                    call_id,
                    component_id = %component_id,
                    "Dropping result of abandoned call"
                );
            }
            Err(e) => {
                tracing::debug!(
                    call_id,
                    component_id = %component_id,
                    event = %event,
                    code = e.code(),
                    "Recording tool error"
                );
                self.handle.state.set(
                    format!("{component_id}:error"),
                    json!({ "code": e.code(), "message": e.message() }),
                );
            }
        }
    }

    /// Components whose read keys were written since the last render
    pub fn dirty_components(&self) -> BTreeSet<String> {
        self.dirty.lock().clone()
    }

    pub fn needs_render(&self) -> bool {
        !self.dirty.lock().is_empty()
    }

    /// Remote calls started by this session and not yet applied
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Mount changes of each virtualized list in the latest pass
    pub fn mount_changes(&self) -> &BTreeMap<String, MountDiff> {
        &self.mount_changes
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }
}

/// Drives open/close signals for every window of a shell
pub struct WindowHost {
    registry: InstanceRegistry,
    renderer: Arc<Renderer>,
    sessions: HashMap<String, WindowSession>,
}

impl WindowHost {
    pub fn new(transport: Arc<dyn ToolTransport>, config: RuntimeConfig) -> Self {
        Self::with_renderer(transport, Renderer::new(config))
    }

    /// Use a renderer with a customized strategy table
    pub fn with_renderer(transport: Arc<dyn ToolTransport>, renderer: Renderer) -> Self {
        let dispatch = renderer.config().dispatch.clone();
        Self {
            registry: InstanceRegistry::with_config(transport, dispatch),
            renderer: Arc::new(renderer),
            sessions: HashMap::new(),
        }
    }

    /// Open a window, or replace the spec of one already open for the same app
    pub fn open(
        &mut self,
        window_id: &str,
        app_id: &str,
        spec: UiSpec,
    ) -> Result<&mut WindowSession, LifecycleError> {
        let _span = tracing::info_span!("window_open", window_id, app_id).entered();
        let handle = self.registry.get_or_create(window_id, app_id)?;

        let session = match self.sessions.entry(window_id.to_string()) {
            Entry::Occupied(entry) => {
                let session = entry.into_mut();
                session.set_spec(spec);
                session
            }
            Entry::Vacant(entry) => entry.insert(WindowSession::new(
                window_id.to_string(),
                app_id.to_string(),
                handle,
                spec,
                Arc::clone(&self.renderer),
            )),
        };
        Ok(session)
    }

    /// Close a window and dispose its instance
    pub fn close(&mut self, window_id: &str) -> Result<(), LifecycleError> {
        let _span = tracing::info_span!("window_close", window_id).entered();
        let session = self.sessions.remove(window_id);
        let removed = self.registry.remove(window_id);
        if session.is_none() && !removed {
            return Err(LifecycleError::UnknownWindow(window_id.to_string()));
        }
        Ok(())
    }

    /// Close every window
    pub fn shutdown(&mut self) -> usize {
        self.sessions.clear();
        self.registry.clear()
    }

    pub fn session(&self, window_id: &str) -> Option<&WindowSession> {
        self.sessions.get(window_id)
    }

    pub fn session_mut(&mut self, window_id: &str) -> Option<&mut WindowSession> {
        self.sessions.get_mut(window_id)
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn window_count(&self) -> usize {
        self.sessions.len()
    }
}
