use k8s_openapi as k8s;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde::{Deserialize, Serialize};

pub use v1alpha5::Condition;
pub use v1alpha5::ConditionStatus;
pub use v1alpha5::Conditions;
pub use v1alpha5::Machine;
pub use v1alpha5::Provisioner;

pub mod v1alpha5;

fn default<T: Default>() -> T {
    T::default()
}
