use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use k8s_disruption_kubeapi::KubeApi;

use super::*;

#[derive(Debug, thiserror::Error)]
pub enum CloudProviderError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error("provisioner {0} not found")]
    ProvisionerNotFound(String),
}

/// Backend that decides whether a Machine still matches its desired configuration
///
#[async_trait::async_trait]
pub trait CloudProvider: fmt::Debug + Send + Sync {
    async fn is_drifted(&self, machine: &Machine) -> Result<bool, CloudProviderError>;
}

/// Scriptable [`CloudProvider`]: answers with a fixed result after an
/// optional delay and counts the calls it receives.
///
#[derive(Debug, Default)]
pub struct FakeCloudProvider {
    answer: Mutex<Answer>,
    calls: AtomicUsize,
}

#[derive(Clone, Debug)]
struct Answer {
    drifted: Result<bool, String>,
    delay: Option<Duration>,
}

impl Default for Answer {
    fn default() -> Self {
        Self {
            drifted: Ok(false),
            delay: None,
        }
    }
}

impl FakeCloudProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_drifted(&self, drifted: bool) {
        self.answer().drifted = Ok(drifted);
    }

    pub fn set_error(&self, message: impl ToString) {
        self.answer().drifted = Err(message.to_string());
    }

    /// Delay every answer by `delay`, measured on the tokio clock
    ///
    pub fn set_delay(&self, delay: impl Into<Option<Duration>>) {
        self.answer().delay = delay.into();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        *self.answer() = Answer::default();
        self.calls.store(0, Ordering::SeqCst);
    }

    fn answer(&self) -> MutexGuard<'_, Answer> {
        self.answer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl CloudProvider for FakeCloudProvider {
    async fn is_drifted(&self, _machine: &Machine) -> Result<bool, CloudProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer().clone();
        if let Some(delay) = answer.delay {
            tokio::time::sleep(delay).await;
        }
        answer.drifted.map_err(CloudProviderError::Message)
    }
}

/// Drift detection from the provisioner hash.
///
/// A Machine is drifted when its `karpenter.sh/provisioner-hash` annotation
/// differs from the one on its Provisioner. Without a hash on either side
/// there is nothing to compare and the Machine is not drifted.
///
#[derive(Debug)]
pub struct ProvisionerHashDrift {
    api: Arc<KubeApi>,
}

impl ProvisionerHashDrift {
    pub fn new(api: Arc<KubeApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl CloudProvider for ProvisionerHashDrift {
    async fn is_drifted(&self, machine: &Machine) -> Result<bool, CloudProviderError> {
        let Some(name) = machine.provisioner_name() else {
            return Ok(false);
        };
        let provisioner = self
            .api
            .get_provisioner(name)
            .await?
            .ok_or_else(|| CloudProviderError::ProvisionerNotFound(name.to_string()))?;
        Ok(hash_drifted(machine, &provisioner))
    }
}

fn hash_drifted(machine: &Machine, provisioner: &v1alpha5::Provisioner) -> bool {
    let hash = |metadata: &metav1::ObjectMeta| {
        metadata
            .annotations
            .as_ref()?
            .get(v1alpha5::PROVISIONER_HASH_ANNOTATION_KEY)
            .cloned()
    };
    match (hash(&machine.metadata), hash(&provisioner.metadata)) {
        (Some(machine), Some(provisioner)) => machine != provisioner,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use k8s::ObjectMetaExt as _;
    use time::ext::NumericalStdDuration as _;

    use super::*;

    fn machine(hash: Option<&str>) -> Machine {
        let mut machine = Machine::new("machine-1");
        if let Some(hash) = hash {
            machine.metadata = machine
                .metadata
                .annotation(v1alpha5::PROVISIONER_HASH_ANNOTATION_KEY, hash);
        }
        machine
    }

    fn provisioner(hash: Option<&str>) -> v1alpha5::Provisioner {
        let mut provisioner = v1alpha5::Provisioner::new("default");
        if let Some(hash) = hash {
            provisioner.metadata = provisioner
                .metadata
                .annotation(v1alpha5::PROVISIONER_HASH_ANNOTATION_KEY, hash);
        }
        provisioner
    }

    #[test]
    fn hash_mismatch_is_drift() {
        assert!(hash_drifted(&machine(Some("1234")), &provisioner(Some("5678"))));
    }

    #[test]
    fn hash_match_is_not_drift() {
        assert!(!hash_drifted(&machine(Some("1234")), &provisioner(Some("1234"))));
    }

    #[test]
    fn missing_hash_is_not_drift() {
        assert!(!hash_drifted(&machine(None), &provisioner(Some("1234"))));
        assert!(!hash_drifted(&machine(Some("1234")), &provisioner(None)));
    }

    #[tokio::test]
    async fn fake_answers_and_counts() {
        let cloud = FakeCloudProvider::new();
        let machine = machine(None);

        assert!(!cloud.is_drifted(&machine).await.unwrap());
        cloud.set_drifted(true);
        assert!(cloud.is_drifted(&machine).await.unwrap());
        cloud.set_error("backend down");
        let err = cloud.is_drifted(&machine).await.unwrap_err();

        assert_eq!(err.to_string(), "backend down");
        assert_eq!(cloud.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fake_delay_uses_tokio_time() {
        let cloud = FakeCloudProvider::new();
        cloud.set_delay(5.std_seconds());
        let start = tokio::time::Instant::now();

        cloud.is_drifted(&machine(None)).await.unwrap();

        assert!(start.elapsed() >= 5.std_seconds());
    }

    #[test]
    fn fake_reset() {
        let cloud = FakeCloudProvider::new();
        cloud.set_error("boom");
        cloud.calls.fetch_add(1, Ordering::SeqCst);

        cloud.reset();

        assert_eq!(cloud.calls(), 0);
        assert_eq!(cloud.answer().drifted, Ok(false));
    }
}
