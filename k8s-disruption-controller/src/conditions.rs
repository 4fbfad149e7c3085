use v1alpha5::{Condition, ConditionStatus, Conditions};

use super::*;

/// The disruption conditions managed by this controller
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DisruptionKind {
    Drifted,
    Empty,
    Expired,
}

impl DisruptionKind {
    pub const ALL: [Self; 3] = [Self::Drifted, Self::Empty, Self::Expired];

    pub fn condition_type(self) -> &'static str {
        match self {
            Self::Drifted => v1alpha5::MACHINE_DRIFTED,
            Self::Empty => v1alpha5::MACHINE_EMPTY,
            Self::Expired => v1alpha5::MACHINE_EXPIRED,
        }
    }
}

impl fmt::Display for DisruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.condition_type())
    }
}

/// Mutation front-end over a Machine's [`Conditions`].
///
/// Every setter reports whether it changed anything, and the store remembers
/// if any call did, so callers can skip writes that would be no-ops.
///
#[derive(Debug)]
pub struct ConditionStore<'a> {
    conditions: &'a mut Conditions,
    now: metav1::Time,
    changed: bool,
}

impl<'a> ConditionStore<'a> {
    pub fn new(conditions: &'a mut Conditions, now: Timestamp) -> Self {
        Self {
            conditions,
            now: metav1::Time(now),
            changed: false,
        }
    }

    pub fn get(&self, kind: DisruptionKind) -> Option<&Condition> {
        self.conditions.get(kind.condition_type())
    }

    pub fn set_true(&mut self, kind: DisruptionKind, reason: &str, message: &str) -> bool {
        self.set(kind, ConditionStatus::True, reason, message)
    }

    pub fn set_false(&mut self, kind: DisruptionKind, reason: &str, message: &str) -> bool {
        self.set(kind, ConditionStatus::False, reason, message)
    }

    pub fn set_unknown(&mut self, kind: DisruptionKind, reason: &str, message: &str) -> bool {
        self.set(kind, ConditionStatus::Unknown, reason, message)
    }

    /// Drop `kind` whatever its status; absent is a no-op
    ///
    pub fn remove(&mut self, kind: DisruptionKind) -> bool {
        let removed = self.conditions.remove(kind.condition_type()).is_some();
        self.changed |= removed;
        removed
    }

    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Keeps `lastTransitionTime` when the status is unchanged and only
    /// refreshes reason and message.
    ///
    fn set(
        &mut self,
        kind: DisruptionKind,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> bool {
        let transitioned = match self.get(kind) {
            Some(current) if current.status == status => {
                if current.reason.as_deref() == Some(reason)
                    && current.message.as_deref() == Some(message)
                {
                    return false;
                }
                current.last_transition_time.clone()
            }
            _ => Some(self.now.clone()),
        };
        let mut condition = Condition::new(kind.condition_type(), status)
            .transitioned(transitioned)
            .reason(reason)
            .message(message);
        if let Some(current) = self.get(kind) {
            condition.severity.clone_from(&current.severity);
        }
        self.conditions.insert(condition);
        self.changed = true;
        true
    }
}
