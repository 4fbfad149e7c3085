use std::pin::pin;

use constcat::concat;
use kube::api::Api;
use kube::runtime::WatchStreamExt as _;
use kube::runtime::watcher::Event;

use super::*;

const SETTINGS_CONFIG_MAP: &str = "karpenter-global-settings";
const SETTINGS_FIELD_SELECTOR: &str = concat!("metadata.name=", SETTINGS_CONFIG_MAP);

/// Publish the global settings ConfigMap through `settings`.
///
/// Malformed settings are logged and the last good value stays in effect.
///
pub(crate) async fn watch_settings(
    config_maps: Api<corev1::ConfigMap>,
    settings: watch::Sender<GlobalSettings>,
) {
    let config = watcher::Config::default().fields(SETTINGS_FIELD_SELECTOR);
    let mut events = pin!(watcher(config_maps, config).default_backoff());
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => apply(&settings, event),
            Err(err) => tracing::warn!(%err, "Settings watch failed"),
        }
    }
}

fn apply(settings: &watch::Sender<GlobalSettings>, event: Event<corev1::ConfigMap>) {
    match event {
        Event::Apply(cm) | Event::InitApply(cm) => match GlobalSettings::from_config_map(&cm) {
            Ok(global) => {
                tracing::info!(?global, "Global settings updated");
                settings.send_replace(global);
            }
            Err(err) => tracing::warn!(%err, "Ignoring invalid global settings"),
        },
        Event::Delete(_) => {
            tracing::info!("Global settings removed, using defaults");
            settings.send_replace(GlobalSettings::default());
        }
        Event::Init | Event::InitDone => {}
    }
}
