//! Disruption condition controller.
//!
//! For every initialized Machine the [`DisruptionReconciler`] evaluates three
//! independent criteria and records each outcome as a status condition:
//!
//! - `MachineDrifted`: the cloud provider reports the machine no longer
//!   matches its desired configuration
//! - `MachineEmpty`: the node has run no reschedulable pods for at least the
//!   emptiness TTL
//! - `MachineExpired`: the machine is older than the expiration TTL
//!
//! A criterion that is switched off in [`Settings`] has its condition removed
//! rather than set to `False`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use k8s_disruption_ext as k8s;

use k8s::jiff::SignedDuration;
use k8s::jiff::Timestamp;
use k8s::corev1;
use k8s::metav1;
use k8s::v1alpha5;
use k8s::v1alpha5::Machine;

pub use clock::Clock;
pub use clock::FakeClock;
pub use clock::SystemClock;
pub use cloudprovider::CloudProvider;
pub use cloudprovider::CloudProviderError;
pub use cloudprovider::FakeCloudProvider;
pub use cloudprovider::ProvisionerHashDrift;
pub use conditions::ConditionStore;
pub use conditions::DisruptionKind;
pub use context::ReconcileContext;
pub use error::Error;
pub use evaluator::Criterion;
pub use evaluator::Finding;
pub use evaluator::Inputs;
pub use evaluator::Verdict;
pub use reconciler::DisruptionReconciler;
pub use settings::GlobalSettings;
pub use settings::Settings;
pub use settings::SettingsError;
pub use state::ClusterSnapshot;
pub use state::ClusterState;
pub use store::MachineStore;
pub use store::StoreError;

mod clock;
mod cloudprovider;
mod conditions;
mod context;
mod error;
mod evaluator;
mod reconciler;
mod settings;
mod state;
mod store;

/// Saturating conversion, TTLs beyond the representable range never elapse
///
fn signed(duration: Duration) -> SignedDuration {
    SignedDuration::try_from(duration).unwrap_or(SignedDuration::MAX)
}
