use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::PoisonError;
use std::sync::RwLock;

use k8s::NodeExt as _;
use k8s::PodExt as _;

use super::*;

/// Live view of cluster nodes and the reschedulable pods bound to them.
///
/// Readers take an immutable [`ClusterSnapshot`]; writers copy on write, so a
/// snapshot never changes underneath an in-flight reconciliation.
///
#[derive(Debug, Default)]
pub struct ClusterState {
    snapshot: RwLock<Arc<ClusterSnapshot>>,
}

#[derive(Clone, Debug, Default)]
pub struct ClusterSnapshot {
    /// nodes by name, shared between snapshots
    nodes: BTreeMap<String, Arc<corev1::Node>>,
    /// provider ID to node name
    provider_ids: BTreeMap<String, String>,
    /// node name to keys of the reschedulable pods bound to it
    bindings: BTreeMap<String, BTreeSet<String>>,
    /// pod key to the node name it is bound to
    pods: BTreeMap<String, String>,
    /// node name to the instant its nomination lapses
    nominations: BTreeMap<String, Timestamp>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_node(&self, node: corev1::Node) {
        let Some(name) = node.metadata.name.clone() else {
            return;
        };
        self.mutate(|snapshot| {
            snapshot.provider_ids.retain(|_, owner| *owner != name);
            if let Some(provider_id) = node.provider_id() {
                snapshot
                    .provider_ids
                    .insert(provider_id.to_string(), name.clone());
            }
            snapshot.nodes.insert(name, Arc::new(node));
        });
    }

    pub fn delete_node(&self, name: &str) {
        self.mutate(|snapshot| {
            snapshot.nodes.remove(name);
            snapshot.provider_ids.retain(|_, owner| owner != name);
            snapshot.nominations.remove(name);
        });
    }

    /// Track `pod` against its node; only reschedulable pods count towards occupancy
    ///
    pub fn update_pod(&self, pod: &corev1::Pod) {
        let key = pod.key();
        let node = pod
            .node_name()
            .filter(|_| pod.is_reschedulable())
            .map(str::to_string);
        self.mutate(|snapshot| {
            snapshot.unbind(&key);
            if let Some(node) = node {
                snapshot.bind(key, node);
            }
        });
    }

    pub fn delete_pod(&self, pod: &corev1::Pod) {
        let key = pod.key();
        self.mutate(|snapshot| snapshot.unbind(&key));
    }

    /// Mark a node as the intended destination of pending pods until `until`
    ///
    /// Entry point for a scheduler or provisioner embedding this crate. The
    /// bundled server only watches Nodes and Pods and never nominates.
    ///
    pub fn nominate_node(&self, name: &str, until: Timestamp) {
        self.mutate(|snapshot| {
            snapshot.nominations.insert(name.to_string(), until);
        });
    }

    pub fn reset(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::default();
    }

    fn mutate(&self, f: impl FnOnce(&mut ClusterSnapshot)) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut snapshot));
    }
}

impl ClusterSnapshot {
    pub fn node(&self, provider_id: &str) -> Option<&corev1::Node> {
        self.provider_ids
            .get(provider_id)
            .and_then(|name| self.nodes.get(name))
            .map(Arc::as_ref)
    }

    /// Number of reschedulable pods on the node, `None` if the node is not tracked
    ///
    pub fn occupancy_of(&self, provider_id: &str) -> Option<usize> {
        let name = self.provider_ids.get(provider_id)?;
        let pods = self.bindings.get(name).map_or(0, BTreeSet::len);
        Some(pods)
    }

    /// The instant the node's nomination lapses, if it is nominated
    ///
    pub fn nominated_until(&self, provider_id: &str) -> Option<Timestamp> {
        let name = self.provider_ids.get(provider_id)?;
        self.nominations.get(name).copied()
    }

    pub fn is_nominated(&self, provider_id: &str, now: Timestamp) -> bool {
        self.nominated_until(provider_id)
            .is_some_and(|until| until > now)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn bind(&mut self, key: String, node: String) {
        self.bindings
            .entry(node.clone())
            .or_default()
            .insert(key.clone());
        self.pods.insert(key, node);
    }

    fn unbind(&mut self, key: &str) {
        let Some(node) = self.pods.remove(key) else {
            return;
        };
        if let Some(pods) = self.bindings.get_mut(&node) {
            pods.remove(key);
            if pods.is_empty() {
                self.bindings.remove(&node);
            }
        }
    }
}
