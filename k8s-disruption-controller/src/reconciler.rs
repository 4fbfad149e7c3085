use super::*;

const DEFAULT_DRIFT_TIMEOUT: Duration = Duration::from_secs(10);

/// Evaluates all disruption criteria for one Machine and persists the
/// resulting conditions when they differ from what is stored.
///
#[derive(Debug)]
pub struct DisruptionReconciler {
    store: Arc<dyn MachineStore>,
    cloud: Arc<dyn CloudProvider>,
    cluster: Arc<ClusterState>,
    clock: Arc<dyn Clock>,
    drift_timeout: Duration,
}

impl DisruptionReconciler {
    pub fn new(
        store: Arc<dyn MachineStore>,
        cloud: Arc<dyn CloudProvider>,
        cluster: Arc<ClusterState>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cloud,
            cluster,
            clock,
            drift_timeout: DEFAULT_DRIFT_TIMEOUT,
        }
    }

    /// Upper bound on a single drift query; slower answers count as unknown
    ///
    pub fn drift_timeout(self, drift_timeout: Duration) -> Self {
        Self {
            drift_timeout,
            ..self
        }
    }

    /// Reconcile the Machine called `name`.
    ///
    /// Returns how long to wait before the earliest pending TTL could elapse,
    /// or `None` if nothing is pending. A missing or uninitialized Machine is
    /// left alone.
    ///
    #[tracing::instrument(skip_all, fields(machine = name))]
    pub async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<Duration>, Error> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(mut machine) = self.store.get_machine(name).await.map_err(Error::Store)? else {
            tracing::debug!("Machine not found");
            return Ok(None);
        };

        if !machine.is_initialized() {
            tracing::debug!("Machine not initialized yet");
            return Ok(None);
        }

        let cluster = self.cluster.snapshot();
        let now = self.clock.now();
        let inputs = Inputs {
            machine: &machine,
            cluster: &cluster,
            ctx,
            now,
            cloud: self.cloud.as_ref(),
            drift_timeout: self.drift_timeout,
        };

        let mut verdicts = Vec::with_capacity(Criterion::ALL.len());
        for criterion in Criterion::ALL {
            let verdict = criterion.evaluate(&inputs).await?;
            verdicts.push((criterion.kind(), verdict));
        }

        let wake_after = verdicts
            .iter()
            .filter_map(|(_, verdict)| verdict.wake_after())
            .min();

        let changed = {
            let mut conditions = ConditionStore::new(machine.conditions_mut(), now);
            for (kind, verdict) in &verdicts {
                apply(&mut conditions, *kind, verdict);
            }
            conditions.has_changed()
        };

        if !changed {
            tracing::debug!(?wake_after, "Conditions unchanged");
            return Ok(wake_after);
        }

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.store
            .patch_conditions(&machine)
            .await
            .map_err(Error::Persist)?;

        tracing::debug!(?wake_after, "Conditions persisted");
        Ok(wake_after)
    }
}

fn apply(conditions: &mut ConditionStore<'_>, kind: DisruptionKind, verdict: &Verdict) {
    let changed = match verdict {
        Verdict::Disabled => conditions.remove(kind),
        Verdict::True(finding) => conditions.set_true(kind, finding.reason, &finding.message),
        Verdict::False { finding, .. } => {
            conditions.set_false(kind, finding.reason, &finding.message)
        }
        Verdict::Unknown(finding) => {
            conditions.set_unknown(kind, finding.reason, &finding.message)
        }
    };

    if changed {
        match conditions.get(kind) {
            Some(condition) => tracing::info!(
                condition = %kind,
                status = %condition.status,
                reason = condition.reason.as_deref(),
                "Condition updated"
            ),
            None => tracing::info!(condition = %kind, "Condition removed"),
        }
    }
}
