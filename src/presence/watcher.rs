use std::sync::{Arc, Weak};

use crate::settings::{SettingsStore, SubscriptionId};

use super::connector::RpcConnector;

/// Forwards settings changes to a connector for as long as it is alive.
///
/// Dropping the watcher unsubscribes it.
pub struct SettingsWatcher {
    settings: Arc<SettingsStore>,
    subscription: SubscriptionId,
}

impl SettingsWatcher {
    pub fn attach(settings: Arc<SettingsStore>, connector: Weak<RpcConnector>) -> Self {
        let subscription = settings.subscribe(Arc::new(move |changed| {
            if let Some(connector) = connector.upgrade() {
                connector.on_settings_changed(changed);
            }
        }));

        tracing::debug!("Watching rich presence settings");

        Self {
            settings,
            subscription,
        }
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.settings.unsubscribe(self.subscription);
    }
}
