//! The Discord RPC connector and its lifecycle

use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::discord::TransportLogger;
use crate::error::RpcError;
use crate::host::{PlatformHost, WorldSnapshot};
use crate::settings::{RichPresenceLevel, RichPresenceSettings, SettingsStore};

use super::payload::{PayloadBuilder, PresencePayload};
use super::traits::{
    PlatformConnector, PlatformUser, PresenceTransport, TransportFactory, DISCORD_PLATFORM_NAME,
};
use super::watcher::SettingsWatcher;

const CONNECTOR_PRIORITY: i32 = -10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

/// Pushes the current world to Discord through a [`PresenceTransport`]
pub struct RpcConnector {
    me: Weak<RpcConnector>,
    factory: Arc<dyn TransportFactory>,
    settings: Arc<SettingsStore>,
    state: Mutex<ConnectorState>,
    transport: Mutex<Option<Box<dyn PresenceTransport>>>,
    host: RwLock<Option<Arc<dyn PlatformHost>>>,
    privacy_level: RwLock<RichPresenceLevel>,
    user: Arc<Mutex<Option<PlatformUser>>>,
    watcher: Mutex<Option<SettingsWatcher>>,
}

impl RpcConnector {
    pub fn new(settings: Arc<SettingsStore>, factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        let privacy_level = settings.rich_presence_level();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            factory,
            settings,
            state: Mutex::new(ConnectorState::Uninitialized),
            transport: Mutex::new(None),
            host: RwLock::new(None),
            privacy_level: RwLock::new(privacy_level),
            user: Arc::new(Mutex::new(None)),
            watcher: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ConnectorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn privacy_level(&self) -> RichPresenceLevel {
        *self.privacy_level.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_rich_presence_enabled(&self) -> bool {
        self.privacy_level() > RichPresenceLevel::None
    }

    /// Called by the settings watcher on every settings change
    pub(crate) fn on_settings_changed(&self, settings: &RichPresenceSettings) {
        let new_level = settings.rich_presence_level;
        if new_level == self.privacy_level() {
            // Feature flags are read again on the next status update
            return;
        }

        tracing::debug!("Rich presence level changed to {:?}", new_level);

        // Clear while the old level is still in effect
        if new_level < RichPresenceLevel::Basic {
            self.clear_current_status();
        }

        *self.privacy_level.write().unwrap_or_else(|e| e.into_inner()) = new_level;
    }

    fn set_state(&self, state: ConnectorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn host(&self) -> Option<Arc<dyn PlatformHost>> {
        self.host.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, payload: &PresencePayload) {
        let transport = self.transport.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(transport) = transport.as_ref() {
            if let Err(e) = transport.push(payload) {
                tracing::warn!("Discord presence update failed: {}", e);
            }
        }
    }
}

impl PlatformConnector for RpcConnector {
    fn platform_name(&self) -> &'static str {
        DISCORD_PLATFORM_NAME
    }

    fn priority(&self) -> i32 {
        CONNECTOR_PRIORITY
    }

    fn is_platform_name_unique(&self) -> bool {
        false
    }

    fn username(&self) -> Option<String> {
        self.user
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|u| u.username.clone())
    }

    fn platform_user_id(&self) -> Option<String> {
        self.user
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|u| u.user_id.clone())
    }

    fn initialize(&self, host: Arc<dyn PlatformHost>) -> Result<(), RpcError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                ConnectorState::Uninitialized => *state = ConnectorState::Initializing,
                ConnectorState::Ready => return Ok(()),
                ConnectorState::Initializing | ConnectorState::Disposed => {
                    return Err(RpcError::NotReady)
                }
            }
        }

        let mut transport = self.factory.create(host.discord_app_id());

        let user = Arc::clone(&self.user);
        let on_ready = Box::new(move |platform_user: PlatformUser| {
            tracing::info!("Discord user ready: {}", platform_user.username);
            *user.lock().unwrap_or_else(|e| e.into_inner()) = Some(platform_user);
        });

        let logger = TransportLogger::new(Arc::clone(&self.settings));
        if let Err(e) = transport.initialize(logger, on_ready) {
            tracing::error!("Could not initialize Discord RPC connector: {}", e);
            transport.dispose();
            self.set_state(ConnectorState::Disposed);
            return Err(e);
        }

        if let Err(e) = transport.push(&PresencePayload::blank()) {
            tracing::warn!("Failed to set initial Discord presence: {}", e);
        }

        *self.host.write().unwrap_or_else(|e| e.into_inner()) = Some(host);
        *self.transport.lock().unwrap_or_else(|e| e.into_inner()) = Some(transport);

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == ConnectorState::Disposed {
                // Disposed while the transport was starting up
                drop(state);
                if let Some(mut transport) = self
                    .transport
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take()
                {
                    transport.dispose();
                }
                return Err(RpcError::NotReady);
            }
            *state = ConnectorState::Ready;
        }

        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(SettingsWatcher::attach(
            Arc::clone(&self.settings),
            self.me.clone(),
        ));

        tracing::info!("Discord connector initialized.");
        Ok(())
    }

    fn set_current_status(&self, world: &WorldSnapshot, is_private: bool, total_world_count: usize) {
        if self.state() != ConnectorState::Ready || !self.is_rich_presence_enabled() {
            return;
        }
        let Some(host) = self.host() else {
            return;
        };

        tracing::trace!(
            "Updating presence for session {} ({} worlds open)",
            world.session_id,
            total_world_count
        );

        let payload = PayloadBuilder::new(host.as_ref()).build(
            world,
            is_private,
            self.privacy_level(),
            self.settings.feature_flags(),
        );
        self.push(&payload);
    }

    fn clear_current_status(&self) {
        if self.state() != ConnectorState::Ready {
            return;
        }
        self.push(&PresencePayload::blank());
    }

    fn dispose(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, ConnectorState::Disposed)
        };
        if previous == ConnectorState::Disposed {
            return;
        }

        self.watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        // The host's registry may still hold us, don't keep the host alive in turn
        self.host.write().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(mut transport) = self
            .transport
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            transport.dispose();
            tracing::info!("Discord connector disposed");
        }
    }
}

impl Drop for RpcConnector {
    fn drop(&mut self) {
        self.dispose();
    }
}
