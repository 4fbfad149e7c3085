use k8s::NodeExt as _;
use k8s_disruption_controller::{Error, ReconcileContext, Settings};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use tokio_stream::wrappers::WatchStream;

use super::*;

const CONFLICT_REQUEUE: Duration = Duration::from_secs(5);
const ERROR_REQUEUE: Duration = Duration::from_secs(30);
const RESYNC: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub(crate) enum ReconcileError {
    #[error(transparent)]
    Disruption(#[from] Error),
    #[error("failed to read provisioner {name}")]
    Provisioner {
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// Shared state handed to every reconciliation
///
#[derive(Debug)]
pub(crate) struct Context {
    reconciler: DisruptionReconciler,
    api: Arc<KubeApi>,
    settings: watch::Receiver<GlobalSettings>,
    shutdown: watch::Receiver<bool>,
}

impl Context {
    pub(crate) fn new(
        reconciler: DisruptionReconciler,
        api: Arc<KubeApi>,
        settings: watch::Receiver<GlobalSettings>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reconciler,
            api,
            settings,
            shutdown,
        }
    }

    /// Settings for one reconciliation: the current global settings with the
    /// Provisioner's TTLs applied on top
    ///
    async fn settings(&self, machine: &v1alpha5::Machine) -> Result<Settings, ReconcileError> {
        let global = *self.settings.borrow();
        let Some(name) = machine.provisioner_name() else {
            return Ok(Settings::resolve(&global, None));
        };
        let provisioner = self
            .api
            .get_provisioner(name)
            .await
            .map_err(|source| ReconcileError::Provisioner {
                name: name.to_string(),
                source,
            })?;
        if provisioner.is_none() {
            tracing::debug!(provisioner = name, "Provisioner not found");
        }
        Ok(Settings::resolve(&global, provisioner.as_ref()))
    }
}

/// Drive the Machine controller until SIGTERM or Ctrl-C
///
/// Besides Machine events, a Machine is re-evaluated when its Node or
/// Provisioner changes, and every Machine is re-evaluated when the global
/// settings change.
///
pub(crate) async fn run(api: &KubeApi, context: Arc<Context>) {
    let controller = Controller::new(api.machines(), watcher::Config::default());
    let machines = controller.store();
    let by_node = machines.clone();
    let by_provisioner = machines;
    let settings_changed = WatchStream::from_changes(context.settings.clone()).map(|_| ());

    controller
        .watches(api.nodes(), watcher::Config::default(), move |node: corev1::Node| {
            machines_for_node(&by_node.state(), &node)
        })
        .watches(
            api.provisioners(),
            watcher::Config::default(),
            move |provisioner: v1alpha5::Provisioner| {
                machines_for_provisioner(&by_provisioner.state(), &provisioner)
            },
        )
        .reconcile_all_on(settings_changed)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    tracing::trace!(machine = %object.name, ?action, "Reconciled");
                }
                Err(err) => tracing::debug!(%err, "Reconcile failed"),
            }
        })
        .await;
    tracing::info!("Machine controller stopped");
}

async fn reconcile(
    machine: Arc<v1alpha5::Machine>,
    context: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let Some(name) = machine.metadata.name.as_deref() else {
        return Ok(Action::await_change());
    };
    let settings = context.settings(&machine).await?;
    let ctx = ReconcileContext::with_cancellation(settings, context.shutdown.clone());
    let wake_after = context.reconciler.reconcile(&ctx, name).await?;
    Ok(action(wake_after))
}

fn error_policy(
    machine: Arc<v1alpha5::Machine>,
    error: &ReconcileError,
    _context: Arc<Context>,
) -> Action {
    let name = machine.metadata.name.as_deref().unwrap_or_default();
    tracing::warn!(machine = name, %error, "Reconcile failed, requeueing");
    requeue_after(error)
}

/// Requeue at the next pending TTL, never later than the periodic resync
///
fn action(wake_after: Option<Duration>) -> Action {
    Action::requeue(wake_after.unwrap_or(RESYNC).min(RESYNC))
}

fn machines_for_node(
    machines: &[Arc<v1alpha5::Machine>],
    node: &corev1::Node,
) -> Vec<ObjectRef<v1alpha5::Machine>> {
    let Some(provider_id) = node.provider_id() else {
        return Vec::new();
    };
    machines
        .iter()
        .filter(|machine| machine.provider_id() == Some(provider_id))
        .map(|machine| ObjectRef::from_obj(machine.as_ref()))
        .collect()
}

fn machines_for_provisioner(
    machines: &[Arc<v1alpha5::Machine>],
    provisioner: &v1alpha5::Provisioner,
) -> Vec<ObjectRef<v1alpha5::Machine>> {
    let Some(name) = provisioner.metadata.name.as_deref() else {
        return Vec::new();
    };
    machines
        .iter()
        .filter(|machine| machine.provisioner_name() == Some(name))
        .map(|machine| ObjectRef::from_obj(machine.as_ref()))
        .collect()
}

fn requeue_after(error: &ReconcileError) -> Action {
    match error {
        ReconcileError::Disruption(err) if err.is_conflict() => Action::requeue(CONFLICT_REQUEUE),
        ReconcileError::Disruption(_) | ReconcileError::Provisioner { .. } => {
            Action::requeue(ERROR_REQUEUE)
        }
    }
}

#[cfg(test)]
mod tests {
    use k8s::ObjectMetaExt as _;
    use k8s::metav1;
    use k8s_disruption_controller::StoreError;

    use super::*;

    fn machine(name: &str, provider_id: &str, provisioner: &str) -> Arc<v1alpha5::Machine> {
        let mut machine = v1alpha5::Machine::new(name);
        machine.metadata = machine
            .metadata
            .label(v1alpha5::PROVISIONER_NAME_LABEL_KEY, provisioner);
        machine.status = Some(v1alpha5::MachineStatus {
            provider_id: Some(provider_id.to_string()),
            ..k8s::default()
        });
        Arc::new(machine)
    }

    fn node(provider_id: Option<&str>) -> corev1::Node {
        corev1::Node {
            metadata: metav1::ObjectMeta::new("node-1"),
            spec: Some(corev1::NodeSpec {
                provider_id: provider_id.map(str::to_string),
                ..k8s::default()
            }),
            ..k8s::default()
        }
    }

    fn machines() -> Vec<Arc<v1alpha5::Machine>> {
        vec![
            machine("machine-1", "fake:///node-1", "default"),
            machine("machine-2", "fake:///node-2", "default"),
            machine("machine-3", "fake:///node-3", "gpu"),
        ]
    }

    #[test]
    fn pending_ttl_requeues() {
        let action = action(Some(Duration::from_secs(20)));

        assert_eq!(action, Action::requeue(Duration::from_secs(20)));
    }

    #[test]
    fn nothing_pending_resyncs() {
        assert_eq!(action(None), Action::requeue(RESYNC));
    }

    #[test]
    fn distant_ttl_is_capped_by_resync() {
        let action = action(Some(Duration::from_secs(3600)));

        assert_eq!(action, Action::requeue(RESYNC));
    }

    #[test]
    fn node_change_maps_to_its_machine() {
        let refs = machines_for_node(&machines(), &node(Some("fake:///node-2")));

        assert_eq!(refs, vec![ObjectRef::new("machine-2")]);
    }

    #[test]
    fn unknown_node_maps_to_nothing() {
        assert!(machines_for_node(&machines(), &node(Some("fake:///node-9"))).is_empty());
        assert!(machines_for_node(&machines(), &node(None)).is_empty());
    }

    #[test]
    fn provisioner_change_maps_to_labelled_machines() {
        let provisioner = v1alpha5::Provisioner::new("default");

        let refs = machines_for_provisioner(&machines(), &provisioner);

        assert_eq!(
            refs,
            vec![ObjectRef::new("machine-1"), ObjectRef::new("machine-2")]
        );
    }

    #[tokio::test]
    async fn settings_change_triggers_resync() {
        let (tx, rx) = watch::channel(GlobalSettings::default());
        let mut changes = WatchStream::from_changes(rx);

        tx.send_replace(GlobalSettings {
            drift_enabled: true,
            ..GlobalSettings::default()
        });

        let changed = tokio::time::timeout(Duration::from_secs(1), changes.next())
            .await
            .unwrap();
        assert!(changed.is_some_and(|settings| settings.drift_enabled));
    }

    #[test]
    fn conflict_requeues_quickly() {
        let error = ReconcileError::from(Error::Persist(StoreError::Conflict(
            "machine-1".to_string(),
        )));

        assert_eq!(requeue_after(&error), Action::requeue(CONFLICT_REQUEUE));
    }

    #[test]
    fn other_errors_back_off() {
        let error = ReconcileError::from(Error::Cancelled);

        assert_eq!(requeue_after(&error), Action::requeue(ERROR_REQUEUE));
    }
}
