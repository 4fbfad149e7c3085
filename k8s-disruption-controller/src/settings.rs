use std::collections::BTreeMap;

use super::*;

const DRIFT_ENABLED_KEY: &str = "featureGates.driftEnabled";
const EMPTY_AFTER_KEY: &str = "emptyAfter";
const EXPIRE_AFTER_KEY: &str = "expireAfter";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid boolean {value:?} for {key}")]
    InvalidBool { key: &'static str, value: String },
    #[error("invalid duration {value:?} for {key}")]
    InvalidDuration { key: &'static str, value: String },
}

/// Effective settings for a single reconciliation.
///
/// `None` for a TTL disables that criterion entirely.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub drift_enabled: bool,
    pub empty_after: Option<Duration>,
    pub expire_after: Option<Duration>,
}

impl Settings {
    /// Combine cluster-wide settings with the Machine's Provisioner.
    ///
    /// TTLs configured on the Provisioner take precedence over the global ones.
    ///
    pub fn resolve(global: &GlobalSettings, provisioner: Option<&v1alpha5::Provisioner>) -> Self {
        let empty_after = provisioner
            .and_then(v1alpha5::Provisioner::empty_after)
            .or(global.empty_after);
        let expire_after = provisioner
            .and_then(v1alpha5::Provisioner::expire_after)
            .or(global.expire_after);
        Self {
            drift_enabled: global.drift_enabled,
            empty_after,
            expire_after,
        }
    }

    pub fn drift_enabled(self, drift_enabled: bool) -> Self {
        Self {
            drift_enabled,
            ..self
        }
    }

    pub fn empty_after(self, ttl: impl Into<Option<Duration>>) -> Self {
        Self {
            empty_after: ttl.into(),
            ..self
        }
    }

    pub fn expire_after(self, ttl: impl Into<Option<Duration>>) -> Self {
        Self {
            expire_after: ttl.into(),
            ..self
        }
    }
}

/// Cluster-wide settings, read from the global settings ConfigMap
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalSettings {
    pub drift_enabled: bool,
    pub empty_after: Option<Duration>,
    pub expire_after: Option<Duration>,
}

impl GlobalSettings {
    pub fn from_config_map(cm: &corev1::ConfigMap) -> Result<Self, SettingsError> {
        cm.data
            .as_ref()
            .map_or_else(|| Ok(Self::default()), Self::from_data)
    }

    /// Parse the ConfigMap data. Missing keys take their defaults: drift off, no TTLs.
    ///
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, SettingsError> {
        let drift_enabled = data
            .get(DRIFT_ENABLED_KEY)
            .map(|value| parse_bool(DRIFT_ENABLED_KEY, value))
            .transpose()?
            .unwrap_or_default();
        let empty_after = data
            .get(EMPTY_AFTER_KEY)
            .map(|value| parse_duration(EMPTY_AFTER_KEY, value))
            .transpose()?;
        let expire_after = data
            .get(EXPIRE_AFTER_KEY)
            .map(|value| parse_duration(EXPIRE_AFTER_KEY, value))
            .transpose()?;
        Ok(Self {
            drift_enabled,
            empty_after,
            expire_after,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidBool {
            key,
            value: value.to_string(),
        })
}

/// Go-style duration such as `30s` or `1h30m`; negative values are rejected
///
fn parse_duration(key: &'static str, value: &str) -> Result<Duration, SettingsError> {
    let invalid = || SettingsError::InvalidDuration {
        key,
        value: value.to_string(),
    };
    let nanos = go_parse_duration::parse_duration(value.trim()).map_err(|_| invalid())?;
    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use k8s::ObjectMetaExt as _;
    use time::ext::NumericalStdDuration as _;

    use super::*;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn provisioner(empty: Option<i64>, expire: Option<i64>) -> v1alpha5::Provisioner {
        let mut provisioner = v1alpha5::Provisioner::new("default");
        provisioner.spec.ttl_seconds_after_empty = empty;
        provisioner.spec.ttl_seconds_until_expired = expire;
        provisioner
    }

    #[test]
    fn global_defaults() {
        let global = GlobalSettings::from_data(&data(&[])).unwrap();

        assert_eq!(global, GlobalSettings::default());
        assert!(!global.drift_enabled);
    }

    #[test]
    fn global_parses_all_keys() {
        let global = GlobalSettings::from_data(&data(&[
            (DRIFT_ENABLED_KEY, "true"),
            (EMPTY_AFTER_KEY, "30s"),
            (EXPIRE_AFTER_KEY, "1h30m"),
        ]))
        .unwrap();

        assert!(global.drift_enabled);
        assert_eq!(global.empty_after, Some(30.std_seconds()));
        assert_eq!(global.expire_after, Some(5400.std_seconds()));
    }

    #[test]
    fn global_rejects_bad_bool() {
        let err = GlobalSettings::from_data(&data(&[(DRIFT_ENABLED_KEY, "yes please")]))
            .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::InvalidBool {
                key: DRIFT_ENABLED_KEY,
                ..
            }
        ));
    }

    #[test]
    fn global_rejects_bad_duration() {
        let err = GlobalSettings::from_data(&data(&[(EMPTY_AFTER_KEY, "soon")])).unwrap_err();

        assert!(matches!(
            err,
            SettingsError::InvalidDuration {
                key: EMPTY_AFTER_KEY,
                ..
            }
        ));
    }

    #[test]
    fn global_rejects_negative_duration() {
        let err = GlobalSettings::from_data(&data(&[(EXPIRE_AFTER_KEY, "-5m")])).unwrap_err();

        assert!(matches!(err, SettingsError::InvalidDuration { .. }));
    }

    #[test]
    fn global_from_config_map_without_data() {
        let cm = corev1::ConfigMap {
            metadata: metav1::ObjectMeta::with_namespace("karpenter-global-settings", "karpenter"),
            ..k8s::default()
        };

        let global = GlobalSettings::from_config_map(&cm).unwrap();

        assert_eq!(global, GlobalSettings::default());
    }

    #[test]
    fn resolve_without_provisioner_uses_global() {
        let global = GlobalSettings {
            drift_enabled: true,
            empty_after: Some(30.std_seconds()),
            expire_after: None,
        };

        let settings = Settings::resolve(&global, None);

        assert_eq!(
            settings,
            Settings::default()
                .drift_enabled(true)
                .empty_after(30.std_seconds())
        );
    }

    #[test]
    fn resolve_provisioner_overrides_global() {
        let global = GlobalSettings {
            drift_enabled: false,
            empty_after: Some(300.std_seconds()),
            expire_after: Some(3600.std_seconds()),
        };
        let provisioner = provisioner(Some(30), None);

        let settings = Settings::resolve(&global, Some(&provisioner));

        assert!(!settings.drift_enabled);
        assert_eq!(settings.empty_after, Some(30.std_seconds()));
        assert_eq!(settings.expire_after, Some(3600.std_seconds()));
    }

    #[test]
    fn resolve_nothing_configured_disables_ttls() {
        let provisioner = provisioner(None, None);

        let settings = Settings::resolve(&GlobalSettings::default(), Some(&provisioner));

        assert_eq!(settings, Settings::default());
    }
}
