use std::fmt;

use k8s_disruption_ext as k8s;
use kube::api;

use k8s::corev1;
use k8s::v1alpha5;

const FIELD_MANAGER: &str = "karpenter-disruption";

pub struct KubeApi {
    patch_params: api::PatchParams,
    client: kube::Client,
}

impl KubeApi {
    /// Create a KubeApi configured with a default Kubernetes client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), kube::Error> {
    /// let api = k8s_disruption_kubeapi::KubeApi::new().await?;
    /// // use `api`...
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new() -> kube::Result<Self> {
        kube::Client::try_default().await.map(Self::with_client)
    }

    /// Create a KubeApi backed by the provided Kubernetes client.
    ///
    /// Status patches are sent with the `karpenter-disruption` field manager.
    ///
    pub fn with_client(client: kube::Client) -> Self {
        let patch_params = api::PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..api::PatchParams::default()
        };
        Self {
            patch_params,
            client,
        }
    }

    /// Fetch a Machine by name, `None` if it does not exist.
    ///
    pub async fn get_machine(&self, name: &str) -> kube::Result<Option<v1alpha5::Machine>> {
        self.machines().get_opt(name).await
    }

    /// Fetch a Provisioner by name, `None` if it does not exist.
    ///
    pub async fn get_provisioner(
        &self,
        name: &str,
    ) -> kube::Result<Option<v1alpha5::Provisioner>> {
        self.provisioners().get_opt(name).await
    }

    /// Replace the Machine's status conditions with the ones on `machine`.
    ///
    /// The merge patch carries the observed `resourceVersion`, so a write
    /// racing with another writer fails with `409 Conflict` instead of
    /// silently overwriting it.
    ///
    pub async fn patch_machine_conditions(
        &self,
        machine: &v1alpha5::Machine,
    ) -> kube::Result<v1alpha5::Machine> {
        let name = machine.metadata.name.as_deref().unwrap_or_default();
        let patch = conditions_patch(machine);
        tracing::debug!(name, %patch, "Patching machine conditions");
        self.machines()
            .patch_status(name, &self.patch_params, &api::Patch::Merge(&patch))
            .await
    }

    /// Returns an Api handle scoped to all Machines.
    ///
    pub fn machines(&self) -> api::Api<v1alpha5::Machine> {
        api::Api::all(self.client.clone())
    }

    /// Returns an Api handle scoped to all Provisioners.
    ///
    pub fn provisioners(&self) -> api::Api<v1alpha5::Provisioner> {
        api::Api::all(self.client.clone())
    }

    /// Returns an Api handle scoped to all Nodes.
    ///
    pub fn nodes(&self) -> api::Api<corev1::Node> {
        api::Api::all(self.client.clone())
    }

    /// Returns an Api handle scoped to all Pods.
    ///
    pub fn pods(&self) -> api::Api<corev1::Pod> {
        api::Api::all(self.client.clone())
    }

    /// Returns an Api handle for ConfigMaps in `namespace`.
    ///
    pub fn config_maps(&self, namespace: &str) -> api::Api<corev1::ConfigMap> {
        api::Api::namespaced(self.client.clone(), namespace)
    }
}

impl fmt::Debug for KubeApi {
    /// Formats the `KubeApi` for debugging, redacting the `client`.
    ///
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeApi")
            .field("patch_params", &self.patch_params)
            .field("client", &"<kube::Client>")
            .finish()
    }
}

/// Whether `err` is the API server rejecting a write on a stale `resourceVersion`
///
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

fn conditions_patch(machine: &v1alpha5::Machine) -> serde_json::Value {
    let conditions = machine.conditions().cloned().unwrap_or_default();
    let mut patch = serde_json::json!({
        "status": {
            "conditions": conditions,
        }
    });
    if let Some(resource_version) = &machine.metadata.resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": resource_version });
    }
    patch
}
