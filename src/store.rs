//! Data store seam.
//!
//! Everything the rule engines touch goes through [`DataStore`]: point
//! reads, partial updates, full writes, a child-equality query, and
//! subscriptions that push the full value at a path on every change. The
//! hosted database implements it in `client.rs`. The tests run the rule
//! engines against an in-process `MemoryStore`.

#[cfg(test)]
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub const COMPLAINTS: &str = "complaints";
pub const WORKERS: &str = "workers";

pub fn complaint_path(id: &str) -> String {
    format!("{COMPLAINTS}/{id}")
}

pub fn worker_path(id: &str) -> String {
    format!("{WORKERS}/{id}")
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Current value at `path`, `Value::Null` when absent.
    async fn get(&self, path: &str) -> Result<Value>;

    /// Children of `path` whose `child` field equals `value`.
    async fn query_equal(&self, path: &str, child: &str, value: &str) -> Result<Value>;

    /// Merge `fields` into the object at `path`.
    async fn update(&self, path: &str, fields: Value) -> Result<()>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Start listening at `path`. The first notification carries the value
    /// as of subscription time.
    async fn subscribe(&self, path: &str) -> Result<Subscription>;
}

/// Live handle on a subscribed path. Dropping it detaches the listener.
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Result<Value>>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        path: impl Into<String>,
        rx: mpsc::UnboundedReceiver<Result<Value>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            path: path.into(),
            rx,
            cancel,
        }
    }

    /// Next full snapshot. `None` once cancelled or the source is gone.
    pub async fn next(&mut self) -> Option<Result<Value>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(path = %self.path, "detaching subscription");
        }
        self.cancel.cancel();
    }
}

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
pub fn value_at<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(tree, |node, key| node.as_object()?.get(key))
}

/// Write `value` at `path`, creating intermediate objects. Writing null
/// removes the node and prunes parents left empty.
pub fn set_at(tree: &mut Value, path: &str, value: Value) {
    let keys = segments(path);
    set_keys(tree, &keys, value);
}

fn set_keys(node: &mut Value, keys: &[&str], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        *node = value;
        return;
    };
    if value.is_null() && !node.is_object() {
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        if value.is_null() {
            map.remove(*first);
        } else {
            map.insert((*first).to_string(), value);
        }
    } else {
        let child = map.entry((*first).to_string()).or_insert(Value::Null);
        set_keys(child, rest, value);
        if child.is_null() || child.as_object().is_some_and(Map::is_empty) {
            map.remove(*first);
        }
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}

/// Merge each key of `fields` under `path`. Keys may themselves be
/// slash-separated relative paths.
pub fn update_at(tree: &mut Value, path: &str, fields: Value) {
    let Value::Object(fields) = fields else {
        set_at(tree, path, fields);
        return;
    };
    for (key, value) in fields {
        set_at(tree, &join(path, &key), value);
    }
}

pub fn join(base: &str, child: &str) -> String {
    let mut keys = segments(base);
    keys.extend(segments(child));
    keys.join("/")
}

/// True when a write at `written` can change the value seen at `watched`.
#[cfg(test)]
pub fn overlaps(watched: &str, written: &str) -> bool {
    let a = segments(watched);
    let b = segments(written);
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
struct Watcher {
    path: String,
    tx: mpsc::UnboundedSender<Result<Value>>,
    cancel: CancellationToken,
}

#[cfg(test)]
impl Watcher {
    fn is_live(&self) -> bool {
        !self.tx.is_closed() && !self.cancel.is_cancelled()
    }
}

/// In-process tree with the same semantics as the hosted store.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryStore {
    tree: Arc<Mutex<Value>>,
    watchers: Arc<Mutex<Vec<Watcher>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(tree: Value) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            watchers: Arc::default(),
        }
    }

    pub fn snapshot(&self) -> Value {
        self.lock_tree().clone()
    }

    fn lock_tree(&self) -> std::sync::MutexGuard<'_, Value> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, written: &str) {
        let tree = self.snapshot();
        let mut watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        watchers.retain(Watcher::is_live);
        for watcher in watchers.iter().filter(|w| overlaps(&w.path, written)) {
            let value = value_at(&tree, &watcher.path).cloned().unwrap_or(Value::Null);
            let _ = watcher.tx.send(Ok(value));
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DataStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Value> {
        Ok(value_at(&self.lock_tree(), path).cloned().unwrap_or(Value::Null))
    }

    async fn query_equal(&self, path: &str, child: &str, value: &str) -> Result<Value> {
        let tree = self.lock_tree();
        let matches: Map<String, Value> = value_at(&tree, path)
            .and_then(Value::as_object)
            .map(|children| {
                children
                    .iter()
                    .filter(|(_, v)| v.get(child).and_then(Value::as_str) == Some(value))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Object(matches))
    }

    async fn update(&self, path: &str, fields: Value) -> Result<()> {
        update_at(&mut self.lock_tree(), path, fields);
        self.notify(path);
        Ok(())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        set_at(&mut self.lock_tree(), path, value);
        self.notify(path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let current = self.get(path).await?;
        let _ = tx.send(Ok(current));
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Watcher {
                path: path.to_string(),
                tx,
                cancel: cancel.clone(),
            });
        Ok(Subscription::new(path, rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_read_nested() {
        let mut tree = Value::Null;
        set_at(&mut tree, "workers/W1/name", json!("Ravi"));
        assert_eq!(value_at(&tree, "workers/W1/name"), Some(&json!("Ravi")));
        assert_eq!(value_at(&tree, "/workers/W1/"), Some(&json!({ "name": "Ravi" })));
        assert_eq!(value_at(&tree, "workers/W2"), None);
    }

    #[test]
    fn test_null_write_prunes_empty_parents() {
        let mut tree = json!({ "workers": { "W1": { "name": "Ravi" } }, "complaints": { "C1": {} } });
        set_at(&mut tree, "workers/W1/name", Value::Null);
        assert_eq!(tree, json!({ "complaints": { "C1": {} } }));
    }

    #[test]
    fn test_update_merges_relative_paths() {
        let mut tree = json!({ "complaints": { "C1": { "status": "Pending", "title": "Pothole" } } });
        update_at(
            &mut tree,
            "complaints/C1",
            json!({ "status": "Assigned", "meta/by": "admin" }),
        );
        assert_eq!(
            tree,
            json!({ "complaints": { "C1": { "status": "Assigned", "title": "Pothole", "meta": { "by": "admin" } } } })
        );
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps("complaints", "complaints/C1"));
        assert!(overlaps("complaints/C1", "complaints"));
        assert!(overlaps("complaints/C1", "complaints/C1/status"));
        assert!(!overlaps("complaints/C1", "complaints/C2"));
        assert!(!overlaps("workers", "complaints/C1"));
    }

    #[tokio::test]
    async fn test_query_equal() {
        let store = MemoryStore::with_data(json!({
            "workers": {
                "A": { "department_pincode": "garbage_110001" },
                "B": { "department_pincode": "water_110001" },
                "C": { "department_pincode": "garbage_110001" }
            }
        }));
        let hits = store
            .query_equal(WORKERS, "department_pincode", "garbage_110001")
            .await
            .unwrap();
        assert_eq!(hits.as_object().unwrap().len(), 2);
        let none = store.query_equal("missing", "x", "y").await.unwrap();
        assert_eq!(none, json!({}));
    }

    #[tokio::test]
    async fn test_subscription_pushes_full_value() {
        let store = MemoryStore::with_data(json!({ "complaints": { "C1": { "status": "Pending" } } }));
        let mut sub = store.subscribe(COMPLAINTS).await.unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first, json!({ "C1": { "status": "Pending" } }));

        store
            .update("complaints/C2", json!({ "status": "Assigned" }))
            .await
            .unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(
            second,
            json!({ "C1": { "status": "Pending" }, "C2": { "status": "Assigned" } })
        );

        store.set("workers/W1", json!({ "name": "Ravi" })).await.unwrap();
        assert!(sub.rx.try_recv().is_err());

        store
            .update("complaints/C1", json!({ "status": "Resolved" }))
            .await
            .unwrap();
        let third = sub.next().await.unwrap().unwrap();
        assert_eq!(third["C1"]["status"], "Resolved");

        sub.cancel();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_subscription_is_pruned_before_drop() {
        let store = MemoryStore::new();
        let sub = store.subscribe(WORKERS).await.unwrap();
        sub.cancel();
        store.set("workers/W1", json!({ "name": "A" })).await.unwrap();
        assert!(store.watchers.lock().unwrap().is_empty());
        drop(sub);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let store = MemoryStore::new();
        let sub = store.subscribe(WORKERS).await.unwrap();
        drop(sub);
        store.set("workers/W1", json!({ "name": "A" })).await.unwrap();
        assert!(store.watchers.lock().unwrap().is_empty());
    }
}
