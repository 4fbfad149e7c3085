pub use jiff;
pub use k8s_disruption::v1alpha5;
pub use k8s_openapi as openapi;
pub use k8s_openapi::api::core::v1 as corev1;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

pub use time::TimeExt;

use jiff::Timestamp;

mod time;

const MIRROR_POD_ANNOTATION_KEY: &str = "kubernetes.io/config.mirror";

pub trait ObjectMetaExt {
    fn new(name: impl ToString) -> Self;
    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self;
    fn created(self, ts: impl Into<Option<metav1::Time>>) -> Self;
    fn label(self, key: impl ToString, value: impl ToString) -> Self;
    fn annotation(self, key: impl ToString, value: impl ToString) -> Self;
}

impl ObjectMetaExt for metav1::ObjectMeta {
    fn new(name: impl ToString) -> Self {
        let name = Some(name.to_string());
        Self { name, ..default() }
    }

    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::new(name)
        }
    }

    fn created(self, ts: impl Into<Option<metav1::Time>>) -> Self {
        Self {
            creation_timestamp: ts.into(),
            ..self
        }
    }

    fn label(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.labels
            .get_or_insert_with(default)
            .insert(key.to_string(), value.to_string());
        self
    }

    fn annotation(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.annotations
            .get_or_insert_with(default)
            .insert(key.to_string(), value.to_string());
        self
    }
}

pub trait NodeExt {
    fn provider_id(&self) -> Option<&str>;

    /// Instant the node was first observed empty, if recorded.
    ///
    /// `Some(Err(_))` means the annotation is present but malformed.
    ///
    fn emptiness_timestamp(&self) -> Option<Result<Timestamp, jiff::Error>>;
}

impl NodeExt for corev1::Node {
    fn provider_id(&self) -> Option<&str> {
        self.spec.as_ref()?.provider_id.as_deref()
    }

    fn emptiness_timestamp(&self) -> Option<Result<Timestamp, jiff::Error>> {
        self.metadata
            .annotations
            .as_ref()?
            .get(v1alpha5::EMPTINESS_TIMESTAMP_ANNOTATION_KEY)
            .map(|text| text.parse())
    }
}

pub trait PodExt {
    /// `namespace/name` of the pod
    ///
    fn key(&self) -> String;
    fn node_name(&self) -> Option<&str>;
    fn is_terminal(&self) -> bool;
    fn is_terminating(&self) -> bool;
    fn is_owned_by(&self, kind: &str) -> bool;
    fn is_mirror(&self) -> bool;

    /// Whether the pod would need a new home if its node went away.
    ///
    /// DaemonSet pods, static (mirror) pods and pods that are finished or
    /// already going away are not.
    ///
    fn is_reschedulable(&self) -> bool {
        !(self.is_terminal()
            || self.is_terminating()
            || self.is_mirror()
            || self.is_owned_by("DaemonSet"))
    }
}

impl PodExt for corev1::Pod {
    fn key(&self) -> String {
        let namespace = self.metadata.namespace.as_deref().unwrap_or_default();
        let name = self.metadata.name.as_deref().unwrap_or_default();
        format!("{namespace}/{name}")
    }

    fn node_name(&self) -> Option<&str> {
        self.spec.as_ref()?.node_name.as_deref()
    }

    fn is_terminal(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .is_some_and(|phase| matches!(phase, "Succeeded" | "Failed"))
    }

    fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    fn is_owned_by(&self, kind: &str) -> bool {
        self.metadata
            .owner_references
            .iter()
            .flatten()
            .any(|owner| owner.kind == kind)
    }

    fn is_mirror(&self) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(MIRROR_POD_ANNOTATION_KEY))
            || self.is_owned_by("Node")
    }
}

pub fn default<T: Default>() -> T {
    T::default()
}
