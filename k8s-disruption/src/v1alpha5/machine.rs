use super::*;

/// `Machine` is the lifecycle resource backing a single cluster Node
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub metadata: metav1::ObjectMeta,

    #[serde(default)]
    pub spec: MachineSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MachineStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// taints applied to the node once it registers
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<corev1::Taint>,

    /// taints expected to be removed by a daemon before the node is initialized
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub startup_taints: Vec<corev1::Taint>,

    /// reference to the cloud provider specific template used for launching
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_template_ref: Option<MachineTemplateRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// name of the Node registered for this Machine
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// cloud provider identifier, shared with `node.spec.providerID`
    ///
    #[serde(
        default,
        rename = "providerID",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_id: Option<String>,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl k8s::Resource for Machine {
    const API_VERSION: &'static str = API_GROUP_VERSION;
    const GROUP: &'static str = API_GROUP;
    const KIND: &'static str = "Machine";
    const VERSION: &'static str = API_VERSION;
    const URL_PATH_SEGMENT: &'static str = "machines";
    type Scope = k8s::ClusterResourceScope;
}

impl k8s::ListableResource for Machine {
    const LIST_KIND: &'static str = "MachineList";
}

impl k8s::Metadata for Machine {
    type Ty = metav1::ObjectMeta;

    fn metadata(&self) -> &<Self as k8s::Metadata>::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut <Self as k8s::Metadata>::Ty {
        &mut self.metadata
    }
}

impl Machine {
    /// Create new `Machine` with given `name` and no status
    ///
    pub fn new(name: impl ToString) -> Self {
        let metadata = metav1::ObjectMeta {
            name: Some(name.to_string()),
            ..default()
        };
        Self {
            metadata,
            ..default()
        }
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.status.as_ref().map(|status| &status.conditions)
    }

    /// Mutable access to the conditions, creating an empty status if needed
    ///
    pub fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.status.get_or_insert_with(default).conditions
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.status.as_ref()?.provider_id.as_deref()
    }

    pub fn provisioner_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()?
            .get(PROVISIONER_NAME_LABEL_KEY)
            .map(String::as_str)
    }

    /// A `Machine` is initialized once its `MachineInitialized` condition is `True`
    ///
    pub fn is_initialized(&self) -> bool {
        self.conditions()
            .is_some_and(|conditions| conditions.is_true(MACHINE_INITIALIZED))
    }
}
