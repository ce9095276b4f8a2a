//! Test doubles for the host and the presence transport

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, UNIX_EPOCH};

use url::Url;

use crate::error::RpcError;
use crate::host::{
    HostReadyCallback, Localizer, PlatformHost, SessionLinks, WorldDirectory, WorldListing,
    WorldSnapshot,
};
use crate::presence::{
    ConnectorRef, ConnectorRegistry, PlatformConnector, PlatformUser, PresencePayload,
    PresenceTransport, RpcConnector, SharedConnectorRegistry, TransportFactory,
    TransportReadyCallback,
};
use crate::discord::TransportLogger;
use crate::settings::RichPresenceLevel;

pub fn public_world() -> WorldSnapshot {
    WorldSnapshot {
        name: "<b>Test</b> Lounge".to_string(),
        localized_name: "Test Lounge".to_string(),
        session_id: "S-test".to_string(),
        is_public: true,
        is_private: false,
        user_count: 3,
        max_users: 16,
        hide_from_listing: false,
        session_begin: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        local_session_time: Duration::from_secs(300),
        local_world_time: Duration::ZERO,
    }
}

pub struct FakeHost {
    registry: Box<dyn ConnectorRegistry>,
    worlds: Mutex<Vec<WorldListing>>,
    ready: Mutex<Vec<HostReadyCallback>>,
}

impl FakeHost {
    pub const APP_ID: i64 = 1_234_567_890;

    pub fn new() -> Self {
        Self::with_registry(Box::new(SharedConnectorRegistry::default()))
    }

    pub fn with_registry(registry: Box<dyn ConnectorRegistry>) -> Self {
        Self {
            registry,
            worlds: Mutex::new(vec![public_world().listing()]),
            ready: Mutex::new(Vec::new()),
        }
    }

    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_worlds(&self, worlds: Vec<WorldListing>) {
        *self.worlds.lock().unwrap() = worlds;
    }

    pub fn add_connector(&self, connector: ConnectorRef) {
        loop {
            let current = self.registry.connectors();
            let mut next = current.to_vec();
            next.push(Arc::clone(&connector));
            if self.registry.replace(&current, next).is_ok() {
                return;
            }
        }
    }

    pub fn fire_ready(&self) {
        for callback in self.ready.lock().unwrap().iter() {
            callback();
        }
    }
}

impl Localizer for FakeHost {
    fn get_localized(&self, key: &str, args: &[(&str, String)]) -> String {
        if args.is_empty() {
            return key.to_string();
        }
        let args: Vec<String> = args.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}({})", key, args.join(", "))
    }
}

impl SessionLinks for FakeHost {
    fn session_web_uri(&self, session_id: &str) -> Url {
        Url::parse(&format!("https://go.resonite.com/session/{}", session_id)).unwrap()
    }

    fn session_join_uri(&self, session_id: &str) -> Url {
        Url::parse(&format!("ressession:///{}", session_id)).unwrap()
    }
}

impl WorldDirectory for FakeHost {
    fn worlds(&self) -> Vec<WorldListing> {
        self.worlds.lock().unwrap().clone()
    }
}

impl PlatformHost for FakeHost {
    fn discord_app_id(&self) -> i64 {
        Self::APP_ID
    }

    fn registry(&self) -> &dyn ConnectorRegistry {
        &*self.registry
    }

    fn on_ready(&self, callback: HostReadyCallback) {
        self.ready.lock().unwrap().push(callback);
    }
}

/// Stand-in for a connector the host registered on its own
pub struct StockConnector {
    platform_name: &'static str,
    disposed: AtomicBool,
}

impl StockConnector {
    pub fn new(platform_name: &'static str) -> Self {
        Self {
            platform_name,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl PlatformConnector for StockConnector {
    fn platform_name(&self) -> &'static str {
        self.platform_name
    }

    fn priority(&self) -> i32 {
        0
    }

    fn is_platform_name_unique(&self) -> bool {
        true
    }

    fn username(&self) -> Option<String> {
        None
    }

    fn platform_user_id(&self) -> Option<String> {
        None
    }

    fn initialize(&self, _host: Arc<dyn PlatformHost>) -> Result<(), RpcError> {
        Ok(())
    }

    fn set_current_status(&self, _world: &WorldSnapshot, _is_private: bool, _total: usize) {}

    fn clear_current_status(&self) {}

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Initialized(i64),
    Pushed(PresencePayload),
    Disposed,
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<TransportEvent>>,
    observer: Mutex<Option<Weak<RpcConnector>>>,
    observed: Mutex<Vec<(PresencePayload, RichPresenceLevel)>>,
    ready: Mutex<Option<TransportReadyCallback>>,
    created: AtomicUsize,
}

/// Hands out transports that record everything sent to them
pub struct RecordingFactory {
    fail_init: bool,
    recorder: Arc<Recorder>,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_init: false,
            recorder: Arc::default(),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_init: true,
            recorder: Arc::default(),
        })
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.recorder.events.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<PresencePayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Pushed(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> usize {
        self.recorder.created.load(Ordering::SeqCst)
    }

    /// Record the connector's privacy level at the moment of each push
    pub fn observe(&self, connector: &Arc<RpcConnector>) {
        *self.recorder.observer.lock().unwrap() = Some(Arc::downgrade(connector));
    }

    pub fn observed_levels(&self) -> Vec<(PresencePayload, RichPresenceLevel)> {
        self.recorder.observed.lock().unwrap().clone()
    }

    pub fn fire_ready(&self, user: PlatformUser) {
        if let Some(callback) = self.recorder.ready.lock().unwrap().as_ref() {
            callback(user);
        }
    }
}

impl TransportFactory for RecordingFactory {
    fn create(&self, app_id: i64) -> Box<dyn PresenceTransport> {
        self.recorder.created.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingTransport {
            app_id,
            fail_init: self.fail_init,
            recorder: Arc::clone(&self.recorder),
        })
    }
}

struct RecordingTransport {
    app_id: i64,
    fail_init: bool,
    recorder: Arc<Recorder>,
}

impl RecordingTransport {
    fn record(&self, event: TransportEvent) {
        self.recorder.events.lock().unwrap().push(event);
    }
}

impl PresenceTransport for RecordingTransport {
    fn initialize(
        &mut self,
        logger: TransportLogger,
        on_ready: TransportReadyCallback,
    ) -> Result<(), RpcError> {
        if self.fail_init {
            logger.error("Discord is not running");
            return Err(RpcError::TransportInit("Discord is not running".to_string()));
        }
        self.record(TransportEvent::Initialized(self.app_id));
        *self.recorder.ready.lock().unwrap() = Some(on_ready);
        Ok(())
    }

    fn push(&self, payload: &PresencePayload) -> Result<(), RpcError> {
        self.record(TransportEvent::Pushed(payload.clone()));

        let observer = self.recorder.observer.lock().unwrap().clone();
        if let Some(connector) = observer.and_then(|w| w.upgrade()) {
            self.recorder
                .observed
                .lock()
                .unwrap()
                .push((payload.clone(), connector.privacy_level()));
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.record(TransportEvent::Disposed);
    }
}
