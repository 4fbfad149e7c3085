use std::collections::BTreeMap;
use std::time::Duration;

use super::*;

/// `Provisioner` is the template Machines are launched from
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Provisioner {
    pub metadata: metav1::ObjectMeta,

    #[serde(default)]
    pub spec: ProvisionerSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerSpec {
    /// labels applied to every node launched by this provisioner
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// taints applied to every node launched by this provisioner
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<corev1::Taint>,

    /// number of seconds a node may stay empty before it is considered for
    /// disruption; emptiness is not evaluated when unset
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_empty: Option<i64>,

    /// number of seconds after creation at which a node expires;
    /// expiration is not evaluated when unset
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_until_expired: Option<i64>,
}

impl k8s::Resource for Provisioner {
    const API_VERSION: &'static str = API_GROUP_VERSION;
    const GROUP: &'static str = API_GROUP;
    const KIND: &'static str = "Provisioner";
    const VERSION: &'static str = API_VERSION;
    const URL_PATH_SEGMENT: &'static str = "provisioners";
    type Scope = k8s::ClusterResourceScope;
}

impl k8s::ListableResource for Provisioner {
    const LIST_KIND: &'static str = "ProvisionerList";
}

impl k8s::Metadata for Provisioner {
    type Ty = metav1::ObjectMeta;

    fn metadata(&self) -> &<Self as k8s::Metadata>::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut <Self as k8s::Metadata>::Ty {
        &mut self.metadata
    }
}

impl Provisioner {
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

    /// Emptiness TTL, if configured. Negative values count as unset.
    ///
    pub fn empty_after(&self) -> Option<Duration> {
        ttl(self.spec.ttl_seconds_after_empty)
    }

    /// Expiration TTL, if configured. Negative values count as unset.
    ///
    pub fn expire_after(&self) -> Option<Duration> {
        ttl(self.spec.ttl_seconds_until_expired)
    }
}

fn ttl(seconds: Option<i64>) -> Option<Duration> {
    seconds
        .and_then(|seconds| u64::try_from(seconds).ok())
        .map(Duration::from_secs)
}
