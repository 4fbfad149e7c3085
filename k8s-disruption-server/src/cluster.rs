use std::pin::pin;

use kube::api::Api;
use kube::runtime::WatchStreamExt as _;
use kube::runtime::watcher::Event;

use super::*;

/// Keep `cluster` in step with the Nodes in the cluster
///
pub(crate) async fn watch_nodes(nodes: Api<corev1::Node>, cluster: Arc<ClusterState>) {
    let mut events = pin!(watcher(nodes, watcher::Config::default()).default_backoff());
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => apply_node(&cluster, event),
            Err(err) => tracing::warn!(%err, "Node watch failed"),
        }
    }
}

/// Keep `cluster` in step with the Pods bound to Nodes
///
pub(crate) async fn watch_pods(pods: Api<corev1::Pod>, cluster: Arc<ClusterState>) {
    let mut events = pin!(watcher(pods, watcher::Config::default()).default_backoff());
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => apply_pod(&cluster, event),
            Err(err) => tracing::warn!(%err, "Pod watch failed"),
        }
    }
}

fn apply_node(cluster: &ClusterState, event: Event<corev1::Node>) {
    match event {
        Event::Apply(node) | Event::InitApply(node) => cluster.update_node(node),
        Event::Delete(node) => {
            if let Some(name) = node.metadata.name.as_deref() {
                cluster.delete_node(name);
            }
        }
        Event::Init | Event::InitDone => {}
    }
}

fn apply_pod(cluster: &ClusterState, event: Event<corev1::Pod>) {
    match event {
        Event::Apply(pod) | Event::InitApply(pod) => cluster.update_pod(&pod),
        Event::Delete(pod) => cluster.delete_pod(&pod),
        Event::Init | Event::InitDone => {}
    }
}

#[cfg(test)]
mod tests {
    use k8s::ObjectMetaExt as _;
    use k8s::metav1;

    use super::*;

    fn node() -> corev1::Node {
        corev1::Node {
            metadata: metav1::ObjectMeta::new("node-1"),
            spec: Some(corev1::NodeSpec {
                provider_id: Some("fake:///node-1".to_string()),
                ..k8s::default()
            }),
            ..k8s::default()
        }
    }

    fn pod() -> corev1::Pod {
        corev1::Pod {
            metadata: metav1::ObjectMeta::with_namespace("web-0", "default"),
            spec: Some(corev1::PodSpec {
                node_name: Some("node-1".to_string()),
                ..k8s::default()
            }),
            ..k8s::default()
        }
    }

    #[test]
    fn node_events_track_nodes() {
        let cluster = ClusterState::new();

        apply_node(&cluster, Event::InitApply(node()));
        assert!(cluster.snapshot().node("fake:///node-1").is_some());

        apply_node(&cluster, Event::Delete(node()));
        assert!(cluster.snapshot().node("fake:///node-1").is_none());
    }

    #[test]
    fn pod_events_track_occupancy() {
        let cluster = ClusterState::new();
        apply_node(&cluster, Event::Apply(node()));

        apply_pod(&cluster, Event::Apply(pod()));
        assert_eq!(cluster.snapshot().occupancy_of("fake:///node-1"), Some(1));

        apply_pod(&cluster, Event::Delete(pod()));
        assert_eq!(cluster.snapshot().occupancy_of("fake:///node-1"), Some(0));
    }
}
