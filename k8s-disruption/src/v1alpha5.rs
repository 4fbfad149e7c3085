use constcat::concat;

use super::*;

pub use condition::Condition;
pub use condition::ConditionStatus;
pub use condition::Conditions;
pub use machine::Machine;
pub use machine::MachineSpec;
pub use machine::MachineStatus;
pub use machine::MachineTemplateRef;
pub use provisioner::Provisioner;
pub use provisioner::ProvisionerSpec;

pub const API_GROUP: &str = "karpenter.sh";
pub const API_VERSION: &str = "v1alpha5";
pub const API_GROUP_VERSION: &str = concat!(API_GROUP, "/", API_VERSION);

/// Label linking a Machine (and its Node) to the Provisioner that launched it
///
pub const PROVISIONER_NAME_LABEL_KEY: &str = concat!(API_GROUP, "/provisioner-name");

/// Node annotation recording when the node was first observed without
/// reschedulable pods, in RFC 3339 format
///
pub const EMPTINESS_TIMESTAMP_ANNOTATION_KEY: &str = concat!(API_GROUP, "/emptiness-timestamp");

/// Hash of the Provisioner spec a Machine was launched from
///
pub const PROVISIONER_HASH_ANNOTATION_KEY: &str = concat!(API_GROUP, "/provisioner-hash");

pub const MACHINE_LAUNCHED: &str = "MachineLaunched";
pub const MACHINE_REGISTERED: &str = "MachineRegistered";
pub const MACHINE_INITIALIZED: &str = "MachineInitialized";
pub const MACHINE_DRIFTED: &str = "MachineDrifted";
pub const MACHINE_EMPTY: &str = "MachineEmpty";
pub const MACHINE_EXPIRED: &str = "MachineExpired";

mod condition;
mod machine;
mod provisioner;
