//! Per-window state container
//!
//! A flat key-value map. Keys are plain strings; the `componentId:field`
//! convention used by the renderer is not enforced here.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Callback invoked with the key and the new value after every write
pub type StateCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Identifies one subscription within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by [`StateStore::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub key: String,
    pub id: SubscriptionId,
}

/// One write, as seen by devtools listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub key: String,
    pub value: Value,
    pub previous: Option<Value>,
}

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Flat, instance-scoped key-value store with per-key subscriptions
pub struct StateStore {
    values: RwLock<HashMap<String, Value>>,
    subscribers: Mutex<HashMap<String, Vec<(SubscriptionId, StateCallback)>>>,
    next_subscription: AtomicU64,
    changes: broadcast::Sender<StateChange>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            changes,
        }
    }

    /// Current value, or `None` if the key was never written
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Current value, or `default`
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Write a value and notify the key's subscribers
    ///
    /// The write is visible to `get` before any callback runs. Callbacks are
    /// invoked without holding the store's locks, so they may read or write
    /// the store themselves.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let previous = self.values.write().insert(key.clone(), value.clone());

        let callbacks: Vec<StateCallback> = self
            .subscribers
            .lock()
            .get(&key)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        tracing::trace!(key = %key, subscribers = callbacks.len(), "State write");

        for callback in callbacks {
            callback(&key, &value);
        }

        // No receivers is the normal case outside devtools
        let _ = self.changes.send(StateChange {
            key,
            value,
            previous,
        });
    }

    /// Remove a key; subscribers are not notified
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// Register a callback for writes to `key`
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let key = key.into();
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription { key, id }
    }

    /// Drop one subscription; returns false if it was already gone
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(subs) = subscribers.get_mut(&subscription.key) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(id, _)| *id != subscription.id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            subscribers.remove(&subscription.key);
        }
        removed
    }

    /// Drop every subscription on this store
    pub fn unsubscribe_all(&self) {
        self.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().values().map(Vec::len).sum()
    }

    /// Copy of the whole map, ordered by key
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Stream of every write from now on
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("keys", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_read_your_write() {
        let store = StateStore::new();
        store.set("btn1:count", json!(0));
        store.set("btn1:count", json!(1));
        assert_eq!(store.get("btn1:count"), Some(json!(1)));
    }

    #[test]
    fn test_get_or_default() {
        let store = StateStore::new();
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.get_or("missing", json!("0")), json!("0"));
    }

    #[test]
    fn test_subscribe_only_fires_for_key() {
        let store = StateStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        store.subscribe("display", move |key, value| {
            assert_eq!(key, "display");
            assert_eq!(value, &json!("42"));
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        store.set("other", json!(1));
        store.set("display", json!("42"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_observes_new_value() {
        let store = Arc::new(StateStore::new());
        let inner = Arc::clone(&store);
        let seen = Arc::new(Mutex::new(None));
        let seen_cb = Arc::clone(&seen);
        store.subscribe("k", move |_, _| {
            *seen_cb.lock() = inner.get("k");
        });
        store.set("k", json!("v"));
        assert_eq!(*seen.lock(), Some(json!("v")));
    }

    #[test]
    fn test_unsubscribe() {
        let store = StateStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        let sub = store.subscribe("k", move |_, _| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.unsubscribe(&sub));
        assert!(!store.unsubscribe(&sub));
        store.set("k", json!(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_all() {
        let store = StateStore::new();
        store.subscribe("a", |_, _| {});
        store.subscribe("b", |_, _| {});
        assert_eq!(store.subscriber_count(), 2);
        store.unsubscribe_all();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let store = StateStore::new();
        store.set("b", json!(2));
        store.set("a", json!(1));
        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_changes_stream() {
        let store = StateStore::new();
        let mut rx = store.changes();
        store.set("k", json!(1));
        store.set("k", json!(2));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.previous, None);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.previous, Some(json!(1)));
        assert_eq!(second.value, json!(2));
    }
}
