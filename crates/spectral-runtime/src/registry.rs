//! Instance registry
//!
//! Explicit ownership table from window id to the one state/dispatcher pair
//! that window owns. Per window the only transitions are
//! `absent → active` (`get_or_create`) and `active → absent` (`remove`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use spectral_core::LifecycleError;

use crate::config::DispatchConfig;
use crate::dispatcher::{ToolDispatcher, ToolTransport};
use crate::state::StateStore;

/// A window's state container and dispatcher
#[derive(Clone, Debug)]
pub struct InstanceHandle {
    pub state: Arc<StateStore>,
    pub dispatcher: Arc<ToolDispatcher>,
}

impl InstanceHandle {
    /// True when both halves are the very same instances
    pub fn ptr_eq(&self, other: &InstanceHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state) && Arc::ptr_eq(&self.dispatcher, &other.dispatcher)
    }
}

/// Registry entry for one open window
#[derive(Debug)]
pub struct InstanceRecord {
    pub window_id: String,
    pub app_id: String,
    pub handle: InstanceHandle,
    pub created_at: Instant,
}

/// Window id → instance
pub struct InstanceRegistry {
    transport: Arc<dyn ToolTransport>,
    dispatch: DispatchConfig,
    records: HashMap<String, InstanceRecord>,
}

impl InstanceRegistry {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self::with_config(transport, DispatchConfig::default())
    }

    pub fn with_config(transport: Arc<dyn ToolTransport>, dispatch: DispatchConfig) -> Self {
        Self {
            transport,
            dispatch,
            records: HashMap::new(),
        }
    }

    /// Return the window's instance, creating it on first use
    ///
    /// Repeated calls with the same app id return the identical pair. A
    /// different app id for a live window is refused and the existing
    /// instance is left untouched.
    pub fn get_or_create(
        &mut self,
        window_id: &str,
        app_id: &str,
    ) -> Result<InstanceHandle, LifecycleError> {
        if let Some(record) = self.records.get(window_id) {
            if record.app_id != app_id {
                tracing::warn!(
                    window_id,
                    bound = %record.app_id,
                    requested = app_id,
                    "Refusing app id change for open window"
                );
                return Err(LifecycleError::AppIdMismatch {
                    window_id: window_id.to_string(),
                    bound: record.app_id.clone(),
                    requested: app_id.to_string(),
                });
            }
            return Ok(record.handle.clone());
        }

        let dispatcher = ToolDispatcher::with_config(Arc::clone(&self.transport), &self.dispatch);
        dispatcher.set_app_id(app_id)?;

        let handle = InstanceHandle {
            state: Arc::new(StateStore::new()),
            dispatcher: Arc::new(dispatcher),
        };
        self.records.insert(
            window_id.to_string(),
            InstanceRecord {
                window_id: window_id.to_string(),
                app_id: app_id.to_string(),
                handle: handle.clone(),
                created_at: Instant::now(),
            },
        );

        tracing::info!(window_id, app_id, "Created window instance");
        Ok(handle)
    }

    pub fn get(&self, window_id: &str) -> Option<InstanceHandle> {
        self.records.get(window_id).map(|r| r.handle.clone())
    }

    pub fn record(&self, window_id: &str) -> Option<&InstanceRecord> {
        self.records.get(window_id)
    }

    /// Detach and dispose a window's instance; false if it was not tracked
    pub fn remove(&mut self, window_id: &str) -> bool {
        match self.records.remove(window_id) {
            Some(record) => {
                dispose(&record);
                tracing::info!(
                    window_id,
                    app_id = %record.app_id,
                    lifetime_ms = record.created_at.elapsed().as_millis() as u64,
                    "Removed window instance"
                );
                true
            }
            None => false,
        }
    }

    /// Dispose every instance; returns how many were tracked
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        for (_, record) in self.records.drain() {
            dispose(&record);
        }
        if count > 0 {
            tracing::info!(count, "Cleared all window instances");
        }
        count
    }

    pub fn contains(&self, window_id: &str) -> bool {
        self.records.contains_key(window_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Open window ids, sorted
    pub fn window_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.records.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn dispose(record: &InstanceRecord) {
    record.handle.dispatcher.cleanup();
    record.handle.state.unsubscribe_all();
}
