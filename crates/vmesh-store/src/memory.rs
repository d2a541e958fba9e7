// ── In-memory reference backend ──
//
// Implements the full ConfigStore contract against a path-keyed tree
// behind a single async mutex. Stands in for the external coordination
// service in tests and local development. Transactions are applied to a
// staged copy of the tree, so a failed transaction observes no partial
// state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use crate::error::StoreError;
use crate::ops::StoreOp;
use crate::store::{ChildWatch, ConfigStore, NodeData, WatchEvent};

#[derive(Debug, Clone)]
struct NodeRecord {
    data: Vec<u8>,
    version: u64,
    /// Per-parent sequence counter; monotonic across child deletions.
    next_seq: u64,
}

impl NodeRecord {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            version: 0,
            next_seq: 1,
        }
    }
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, NodeRecord>,
    watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
}

/// In-process [`ConfigStore`] implementation.
///
/// A pending [`ChildWatch`] resolves to [`WatchEvent::Lost`] when the
/// store is dropped, matching a real backend's session teardown.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create a store containing only the root node `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_owned(), NodeRecord::new(Vec::new()));
        Self {
            state: Mutex::new(State {
                nodes,
                watches: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Path helpers ─────────────────────────────────────────────────────

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_owned()
    } else {
        format!("{path}/")
    }
}

/// Immediate child names of `path`, sorted (BTreeMap iteration order).
fn children_of(nodes: &BTreeMap<String, NodeRecord>, path: &str) -> Vec<String> {
    let prefix = child_prefix(path);
    nodes
        .range(prefix.clone()..)
        .take_while(|(p, _)| p.starts_with(&prefix))
        .filter_map(|(p, _)| {
            let rest = &p[prefix.len()..];
            (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_owned())
        })
        .collect()
}

// ── Mutation primitives ──────────────────────────────────────────────
//
// Shared between single ops and staged transaction application. Each
// returns the parent path so callers can fire child watches.

fn apply_create(
    nodes: &mut BTreeMap<String, NodeRecord>,
    path: &str,
    data: Vec<u8>,
) -> Result<String, StoreError> {
    if nodes.contains_key(path) {
        return Err(StoreError::node_exists(path));
    }
    let parent = parent_of(path).ok_or_else(|| StoreError::node_exists("/"))?;
    if !nodes.contains_key(parent) {
        return Err(StoreError::no_node(parent));
    }
    nodes.insert(path.to_owned(), NodeRecord::new(data));
    Ok(parent.to_owned())
}

fn apply_set(
    nodes: &mut BTreeMap<String, NodeRecord>,
    path: &str,
    data: Vec<u8>,
) -> Result<(), StoreError> {
    let record = nodes.get_mut(path).ok_or_else(|| StoreError::no_node(path))?;
    record.data = data;
    record.version += 1;
    Ok(())
}

fn apply_delete(
    nodes: &mut BTreeMap<String, NodeRecord>,
    path: &str,
) -> Result<String, StoreError> {
    if !nodes.contains_key(path) {
        return Err(StoreError::no_node(path));
    }
    if !children_of(nodes, path).is_empty() {
        return Err(StoreError::not_empty(path));
    }
    let parent = parent_of(path).ok_or_else(|| StoreError::not_empty("/"))?;
    nodes.remove(path);
    Ok(parent.to_owned())
}

/// Consume and fire every pending watch on the given parent paths.
/// Watches are one-shot, so firing removes them.
fn fire_children_changed(state: &mut State, parents: impl IntoIterator<Item = String>) {
    for parent in parents {
        if let Some(senders) = state.watches.remove(&parent) {
            debug!(path = %parent, watchers = senders.len(), "child watch fired");
            for tx in senders {
                let _ = tx.send(WatchEvent::ChildrenChanged {
                    path: parent.clone(),
                });
            }
        }
    }
}

// ── ConfigStore implementation ───────────────────────────────────────

impl ConfigStore for MemoryStore {
    async fn create(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let parent = apply_create(&mut state.nodes, path, data)?;
        fire_children_changed(&mut state, [parent]);
        Ok(())
    }

    async fn create_sequential(
        &self,
        parent: &str,
        prefix: &str,
        data: Vec<u8>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .nodes
            .get_mut(parent)
            .ok_or_else(|| StoreError::no_node(parent))?;
        let seq = record.next_seq;
        record.next_seq += 1;

        let path = join(parent, &format!("{prefix}{seq:010}"));
        apply_create(&mut state.nodes, &path, data)?;
        fire_children_changed(&mut state, [parent.to_owned()]);
        Ok(seq)
    }

    async fn get(&self, path: &str) -> Result<NodeData, StoreError> {
        let state = self.state.lock().await;
        let record = state
            .nodes
            .get(path)
            .ok_or_else(|| StoreError::no_node(path))?;
        Ok(NodeData {
            data: record.data.clone(),
            version: record.version,
        })
    }

    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        apply_set(&mut state.nodes, path, data)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let parent = apply_delete(&mut state.nodes, path)?;
        fire_children_changed(&mut state, [parent]);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.nodes.contains_key(path))
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        if !state.nodes.contains_key(path) {
            return Err(StoreError::no_node(path));
        }
        Ok(children_of(&state.nodes, path))
    }

    async fn children_and_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, ChildWatch), StoreError> {
        let mut state = self.state.lock().await;
        if !state.nodes.contains_key(path) {
            return Err(StoreError::no_node(path));
        }
        let names = children_of(&state.nodes, path);
        let (tx, rx) = oneshot::channel();
        state.watches.entry(path.to_owned()).or_default().push(tx);
        Ok((names, ChildWatch::new(rx)))
    }

    async fn submit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        // Validate and apply against a staged copy; commit only if every
        // op succeeds.
        let mut staged = state.nodes.clone();
        let mut touched: BTreeSet<String> = BTreeSet::new();
        for op in &ops {
            match op {
                StoreOp::Create { path, data } => {
                    let parent = apply_create(&mut staged, path, data.clone())?;
                    touched.insert(parent);
                }
                StoreOp::SetData { path, data } => {
                    apply_set(&mut staged, path, data.clone())?;
                }
                StoreOp::Delete { path } => {
                    let parent = apply_delete(&mut staged, path)?;
                    touched.insert(parent);
                }
            }
        }

        state.nodes = staged;
        debug!(ops = ops.len(), "transaction committed");
        fire_children_changed(&mut state, touched);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    async fn store_with(paths: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for path in paths {
            store.create(path, Vec::new()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn create_requires_parent() {
        let store = MemoryStore::new();
        let err = store.create("/a/b", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NoNode { path } if path == "/a"));
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let store = store_with(&["/a"]).await;
        let err = store.create("/a", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NodeExists { .. }));
    }

    #[tokio::test]
    async fn set_data_bumps_version() {
        let store = store_with(&["/a"]).await;
        assert_eq!(store.get("/a").await.unwrap().version, 0);
        store.set_data("/a", b"x".to_vec()).await.unwrap();
        let node = store.get("/a").await.unwrap();
        assert_eq!(node.version, 1);
        assert_eq!(node.data, b"x".to_vec());
    }

    #[tokio::test]
    async fn delete_with_children_rejected() {
        let store = store_with(&["/a", "/a/b"]).await;
        let err = store.delete("/a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotEmpty { .. }));
        assert_ok!(store.delete("/a/b").await);
        assert_ok!(store.delete("/a").await);
        assert!(!store.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn children_are_immediate_and_sorted() {
        let store = store_with(&["/a", "/a/c", "/a/b", "/a/b/nested"]).await;
        assert_eq!(store.children("/a").await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn sequential_numbers_survive_deletion() {
        let store = store_with(&["/q"]).await;
        let first = store
            .create_sequential("/q", "cmd", Vec::new())
            .await
            .unwrap();
        assert_eq!(first, 1);
        store.delete("/q/cmd0000000001").await.unwrap();

        let second = store
            .create_sequential("/q", "cmd", Vec::new())
            .await
            .unwrap();
        assert_eq!(second, 2);
        assert_eq!(store.children("/q").await.unwrap(), vec!["cmd0000000002"]);
    }

    #[tokio::test]
    async fn transaction_is_all_or_nothing() {
        let store = store_with(&["/a"]).await;
        let err = store
            .submit(vec![
                StoreOp::create("/a/one", Vec::new()),
                StoreOp::delete("/missing"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoNode { .. }));
        // The first op must not have leaked through.
        assert!(!store.exists("/a/one").await.unwrap());
    }

    #[tokio::test]
    async fn transaction_applies_in_order() {
        let store = store_with(&["/a", "/a/b"]).await;
        store
            .submit(vec![
                StoreOp::set_data("/a/b", b"new".to_vec()),
                StoreOp::delete("/a/b"),
                StoreOp::create("/a/c", b"c".to_vec()),
            ])
            .await
            .unwrap();
        assert!(!store.exists("/a/b").await.unwrap());
        assert_eq!(store.get("/a/c").await.unwrap().data, b"c".to_vec());
    }

    #[tokio::test]
    async fn watch_fires_on_child_create() {
        let store = store_with(&["/q"]).await;
        let (names, watch) = store.children_and_watch("/q").await.unwrap();
        assert!(names.is_empty());

        store.create("/q/one", Vec::new()).await.unwrap();
        let event = watch.wait().await;
        assert_eq!(
            event,
            WatchEvent::ChildrenChanged {
                path: "/q".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn watch_is_one_shot() {
        let store = store_with(&["/q"]).await;
        let (_, watch) = store.children_and_watch("/q").await.unwrap();
        store.create("/q/one", Vec::new()).await.unwrap();
        watch.wait().await;

        // No re-arm: a second change has nobody to notify, and a fresh
        // watch sees the full current set.
        store.create("/q/two", Vec::new()).await.unwrap();
        let (names, _watch) = store.children_and_watch("/q").await.unwrap();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn watch_fires_on_transactional_delete() {
        let store = store_with(&["/q", "/q/one"]).await;
        let (_, watch) = store.children_and_watch("/q").await.unwrap();
        store
            .submit(vec![StoreOp::delete("/q/one")])
            .await
            .unwrap();
        assert!(matches!(
            watch.wait().await,
            WatchEvent::ChildrenChanged { .. }
        ));
    }

    #[tokio::test]
    async fn dropped_store_resolves_watch_as_lost() {
        let store = store_with(&["/q"]).await;
        let (_, watch) = store.children_and_watch("/q").await.unwrap();
        drop(store);
        assert_eq!(watch.wait().await, WatchEvent::Lost);
    }
}
