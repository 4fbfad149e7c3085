use k8s::NodeExt as _;
use k8s::TimeExt as _;

use super::*;

const DRIFTED: &str = "Drifted";
const NOT_DRIFTED: &str = "NotDrifted";
const DRIFT_CHECK_FAILED: &str = "DriftCheckFailed";
const DRIFT_CHECK_TIMED_OUT: &str = "DriftCheckTimedOut";
const EMPTY: &str = "Empty";
const NODE_NOT_EMPTY: &str = "NodeNotEmpty";
const NODE_NOT_FOUND: &str = "NodeNotFound";
const NODE_NOMINATED: &str = "NodeNominated";
const EMPTINESS_NOT_OBSERVED: &str = "EmptinessNotObserved";
const EMPTINESS_TTL_NOT_ELAPSED: &str = "EmptinessTTLNotElapsed";
const INVALID_EMPTINESS_TIMESTAMP: &str = "InvalidEmptinessTimestamp";
const EXPIRED: &str = "Expired";
const NOT_EXPIRED: &str = "NotExpired";

/// One disruption criterion; each maps onto exactly one [`DisruptionKind`]
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Criterion {
    Drift,
    Emptiness,
    Expiration,
}

/// Reason and message recorded on the condition
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub reason: &'static str,
    pub message: String,
}

/// Outcome of evaluating one [`Criterion`]
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The criterion is switched off; its condition must be absent
    Disabled,
    True(Finding),
    False {
        finding: Finding,
        /// time left until the criterion could become true
        wake_after: Option<Duration>,
    },
    Unknown(Finding),
}

/// Everything a criterion may look at
///
#[derive(Clone, Copy, Debug)]
pub struct Inputs<'a> {
    pub machine: &'a Machine,
    pub cluster: &'a ClusterSnapshot,
    pub ctx: &'a ReconcileContext,
    pub now: Timestamp,
    pub cloud: &'a dyn CloudProvider,
    pub drift_timeout: Duration,
}

impl Criterion {
    pub const ALL: [Self; 3] = [Self::Drift, Self::Emptiness, Self::Expiration];

    pub fn kind(self) -> DisruptionKind {
        match self {
            Self::Drift => DisruptionKind::Drifted,
            Self::Emptiness => DisruptionKind::Empty,
            Self::Expiration => DisruptionKind::Expired,
        }
    }

    /// Evaluate this criterion.
    ///
    /// Only cancellation is an error; backend failures are reported as
    /// [`Verdict::Unknown`].
    ///
    pub async fn evaluate(self, inputs: &Inputs<'_>) -> Result<Verdict, Error> {
        let settings = inputs.ctx.settings();
        match self {
            Self::Drift => drift(inputs).await,
            Self::Emptiness => Ok(emptiness(
                inputs.machine,
                inputs.cluster,
                settings.empty_after,
                inputs.now,
            )),
            Self::Expiration => Ok(expiration(inputs.machine, settings.expire_after, inputs.now)),
        }
    }
}

impl Verdict {
    pub fn wake_after(&self) -> Option<Duration> {
        match self {
            Self::False { wake_after, .. } => *wake_after,
            Self::Disabled | Self::True(_) | Self::Unknown(_) => None,
        }
    }

    fn met(reason: &'static str, message: impl ToString) -> Self {
        Self::True(Finding::new(reason, message))
    }

    fn unmet(reason: &'static str, message: impl ToString) -> Self {
        Self::False {
            finding: Finding::new(reason, message),
            wake_after: None,
        }
    }

    fn unknown(reason: &'static str, message: impl ToString) -> Self {
        Self::Unknown(Finding::new(reason, message))
    }

    fn wake(self, after: Option<Duration>) -> Self {
        match self {
            Self::False { finding, .. } => Self::False {
                finding,
                wake_after: after,
            },
            other => other,
        }
    }
}

impl Finding {
    fn new(reason: &'static str, message: impl ToString) -> Self {
        Self {
            reason,
            message: message.to_string(),
        }
    }
}

async fn drift(inputs: &Inputs<'_>) -> Result<Verdict, Error> {
    if !inputs.ctx.settings().drift_enabled {
        return Ok(Verdict::Disabled);
    }

    let timeout = inputs.drift_timeout;
    let query = tokio::time::timeout(timeout, inputs.cloud.is_drifted(inputs.machine));
    let verdict = tokio::select! {
        biased;
        () = inputs.ctx.cancelled() => return Err(Error::Cancelled),
        answer = query => match answer {
            Ok(Ok(true)) => Verdict::met(DRIFTED, "machine has drifted from its desired configuration"),
            Ok(Ok(false)) => Verdict::unmet(NOT_DRIFTED, "machine matches its desired configuration"),
            Ok(Err(err)) => {
                tracing::warn!(%err, "Drift check failed");
                Verdict::unknown(DRIFT_CHECK_FAILED, format!("drift check failed: {err}"))
            }
            Err(_) => {
                tracing::warn!(?timeout, "Drift check timed out");
                Verdict::unknown(
                    DRIFT_CHECK_TIMED_OUT,
                    format!("drift check did not complete within {timeout:?}"),
                )
            }
        },
    };
    Ok(verdict)
}

fn emptiness(
    machine: &Machine,
    cluster: &ClusterSnapshot,
    empty_after: Option<Duration>,
    now: Timestamp,
) -> Verdict {
    let Some(ttl) = empty_after else {
        return Verdict::Disabled;
    };
    let Some((provider_id, node)) = machine
        .provider_id()
        .and_then(|provider_id| Some((provider_id, cluster.node(provider_id)?)))
    else {
        return Verdict::unmet(NODE_NOT_FOUND, "node for machine is not known");
    };

    if cluster.is_nominated(provider_id, now) {
        return Verdict::unmet(NODE_NOMINATED, "node is nominated for pending pods");
    }

    let pods = cluster.occupancy_of(provider_id).unwrap_or_default();
    if pods > 0 {
        return Verdict::unmet(NODE_NOT_EMPTY, format!("node has {pods} reschedulable pods"));
    }

    match node.emptiness_timestamp() {
        None => Verdict::unmet(EMPTINESS_NOT_OBSERVED, "node emptiness has not been recorded"),
        Some(Err(err)) => Verdict::unknown(
            INVALID_EMPTINESS_TIMESTAMP,
            format!(
                "invalid {} annotation: {err}",
                v1alpha5::EMPTINESS_TIMESTAMP_ANNOTATION_KEY
            ),
        ),
        Some(Ok(since)) => {
            let elapsed = now.duration_since(since);
            match remaining(ttl, elapsed) {
                None => Verdict::met(EMPTY, format!("node has been empty for at least {ttl:?}")),
                Some(left) => Verdict::unmet(
                    EMPTINESS_TTL_NOT_ELAPSED,
                    format!("node has not been empty for {ttl:?} yet"),
                )
                .wake(Some(left)),
            }
        }
    }
}

fn expiration(machine: &Machine, expire_after: Option<Duration>, now: Timestamp) -> Verdict {
    let Some(ttl) = expire_after else {
        return Verdict::Disabled;
    };
    let Some(created) = machine.metadata.creation_timestamp.as_ref() else {
        return Verdict::unmet(NOT_EXPIRED, "machine has no creation timestamp");
    };
    match remaining(ttl, created.age(now)) {
        None => Verdict::met(EXPIRED, format!("machine is older than {ttl:?}")),
        Some(left) => {
            Verdict::unmet(NOT_EXPIRED, format!("machine is younger than {ttl:?}")).wake(Some(left))
        }
    }
}

/// Time left until `elapsed` reaches `ttl`, `None` once it has
///
fn remaining(ttl: Duration, elapsed: SignedDuration) -> Option<Duration> {
    let left = signed(ttl).saturating_sub(elapsed);
    Duration::try_from(left).ok().filter(|left| !left.is_zero())
}
