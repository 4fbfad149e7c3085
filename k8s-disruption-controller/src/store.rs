use k8s_disruption_kubeapi::KubeApi;

use super::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The Machine changed since it was read
    #[error("conflicting update to machine {0}")]
    Conflict(String),
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Where Machines are read from and their conditions written back to
///
#[async_trait::async_trait]
pub trait MachineStore: fmt::Debug + Send + Sync {
    async fn get_machine(&self, name: &str) -> Result<Option<Machine>, StoreError>;

    /// Persist the full condition set of `machine`, guarded by its
    /// `resourceVersion`.
    ///
    async fn patch_conditions(&self, machine: &Machine) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl MachineStore for KubeApi {
    async fn get_machine(&self, name: &str) -> Result<Option<Machine>, StoreError> {
        let machine = KubeApi::get_machine(self, name).await?;
        Ok(machine)
    }

    async fn patch_conditions(&self, machine: &Machine) -> Result<(), StoreError> {
        match self.patch_machine_conditions(machine).await {
            Ok(_) => Ok(()),
            Err(err) if k8s_disruption_kubeapi::is_conflict(&err) => {
                let name = machine.metadata.name.clone().unwrap_or_default();
                Err(StoreError::Conflict(name))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
pub(crate) use memory::InMemoryStore;
