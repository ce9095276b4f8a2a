//! The host's connector list and the swap that installs our connector in it

use std::sync::{Arc, RwLock};

use crate::error::RpcError;
use crate::host::PlatformHost;
use crate::settings::SettingsStore;

use super::connector::RpcConnector;
use super::traits::{PlatformConnector, TransportFactory, DISCORD_PLATFORM_NAME};

pub type ConnectorRef = Arc<dyn PlatformConnector>;
pub type ConnectorList = Arc<[ConnectorRef]>;

/// Host-owned set of active connectors
pub trait ConnectorRegistry: Send + Sync {
    fn connectors(&self) -> ConnectorList;

    /// Replace the list only if it is still `current`.
    ///
    /// On conflict nothing is written and the list actually stored is returned.
    fn replace(&self, current: &ConnectorList, new: Vec<ConnectorRef>) -> Result<(), ConnectorList>;
}

pub fn connectors_of_kind(registry: &dyn ConnectorRegistry, platform_name: &str) -> Vec<ConnectorRef> {
    registry
        .connectors()
        .iter()
        .filter(|c| c.platform_name() == platform_name)
        .cloned()
        .collect()
}

/// Compare-and-swap loop: `edit` gets the current list and returns the new one
/// plus whatever it took out
fn modify<F>(registry: &dyn ConnectorRegistry, mut edit: F) -> Vec<ConnectorRef>
where
    F: FnMut(&[ConnectorRef]) -> (Vec<ConnectorRef>, Vec<ConnectorRef>),
{
    let mut current = registry.connectors();
    loop {
        let (new, removed) = edit(&current[..]);
        match registry.replace(&current, new) {
            Ok(()) => return removed,
            Err(actual) => {
                tracing::debug!("Connector registry changed concurrently, retrying");
                current = actual;
            }
        }
    }
}

fn split_by_kind(
    connectors: &[ConnectorRef],
    platform_name: &str,
) -> (Vec<ConnectorRef>, Vec<ConnectorRef>) {
    connectors
        .iter()
        .cloned()
        .partition(|c| c.platform_name() != platform_name)
}

/// Take every connector of a kind out of the registry in one swap
pub fn remove_connectors_of_kind(
    registry: &dyn ConnectorRegistry,
    platform_name: &str,
) -> Vec<ConnectorRef> {
    modify(registry, |current| split_by_kind(current, platform_name))
}

/// Add `connector`, evicting any other connector of its kind in the same swap
pub fn register_exclusive(registry: &dyn ConnectorRegistry, connector: ConnectorRef) -> Vec<ConnectorRef> {
    let platform_name = connector.platform_name();
    modify(registry, |current| {
        let (mut keep, evicted) = split_by_kind(current, platform_name);
        keep.push(Arc::clone(&connector));
        (keep, evicted)
    })
}

/// Replace whatever Discord connectors the host has with a fresh [`RpcConnector`].
///
/// Stale connectors leave the registry before they are disposed, so readers
/// never see a disposed connector. On failure no Discord connector is left.
pub fn install_rpc_connector(
    host: Arc<dyn PlatformHost>,
    settings: Arc<SettingsStore>,
    factory: Arc<dyn TransportFactory>,
) -> Result<Arc<RpcConnector>, RpcError> {
    let stale = remove_connectors_of_kind(host.registry(), DISCORD_PLATFORM_NAME);
    if !stale.is_empty() {
        tracing::info!("Disposing of {} existing Discord connector(s)", stale.len());
    }
    for connector in stale {
        connector.dispose();
    }

    tracing::info!("Initializing Discord RPC connector");
    let connector = RpcConnector::new(settings, factory);
    if let Err(e) = connector.initialize(Arc::clone(&host)) {
        tracing::error!("Discord RPC connector not registered: {}", e);
        return Err(e);
    }

    let evicted = register_exclusive(host.registry(), connector.clone());
    for other in evicted {
        tracing::info!("Disposing of Discord connector registered concurrently");
        other.dispose();
    }

    tracing::info!("Discord RPC connector initialized successfully");
    Ok(connector)
}

/// Registry kept in process, for hosts without one of their own
pub struct SharedConnectorRegistry {
    connectors: RwLock<ConnectorList>,
}

impl SharedConnectorRegistry {
    pub fn new(connectors: Vec<ConnectorRef>) -> Self {
        Self {
            connectors: RwLock::new(connectors.into()),
        }
    }
}

impl Default for SharedConnectorRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ConnectorRegistry for SharedConnectorRegistry {
    fn connectors(&self) -> ConnectorList {
        self.connectors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace(&self, current: &ConnectorList, new: Vec<ConnectorRef>) -> Result<(), ConnectorList> {
        let mut stored = self.connectors.write().unwrap_or_else(|e| e.into_inner());
        if !Arc::ptr_eq(&*stored, current) {
            return Err(stored.clone());
        }
        *stored = new.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::presence::connector::ConnectorState;
    use crate::testing::{FakeHost, RecordingFactory, StockConnector};

    /// Registry where another writer slips a connector in just before the
    /// `race_on`-th swap, making that swap fail
    struct RacingRegistry {
        inner: SharedConnectorRegistry,
        race_on: usize,
        swaps: AtomicUsize,
        intruder: Mutex<Option<ConnectorRef>>,
    }

    impl RacingRegistry {
        fn new(race_on: usize, intruder: ConnectorRef) -> Self {
            Self {
                inner: SharedConnectorRegistry::default(),
                race_on,
                swaps: AtomicUsize::new(0),
                intruder: Mutex::new(Some(intruder)),
            }
        }
    }

    impl ConnectorRegistry for RacingRegistry {
        fn connectors(&self) -> ConnectorList {
            self.inner.connectors()
        }

        fn replace(
            &self,
            current: &ConnectorList,
            new: Vec<ConnectorRef>,
        ) -> Result<(), ConnectorList> {
            let swap = self.swaps.fetch_add(1, Ordering::SeqCst) + 1;
            if swap == self.race_on {
                if let Some(intruder) = self.intruder.lock().unwrap().take() {
                    let mut raced = self.inner.connectors().to_vec();
                    raced.push(intruder);
                    let stored = self.inner.connectors();
                    assert!(self.inner.replace(&stored, raced).is_ok());
                }
            }
            self.inner.replace(current, new)
        }
    }

    fn racing_install(race_on: usize) -> (Arc<FakeHost>, Arc<StockConnector>, usize) {
        let intruder = Arc::new(StockConnector::new(DISCORD_PLATFORM_NAME));
        let registry = RacingRegistry::new(race_on, intruder.clone());
        let host = Arc::new(FakeHost::with_registry(Box::new(registry)));

        let connector = install_rpc_connector(
            host.clone(),
            Arc::new(SettingsStore::default()),
            RecordingFactory::new(),
        )
        .unwrap();
        assert_eq!(connector.state(), ConnectorState::Ready);

        let discord = connectors_of_kind(host.registry(), DISCORD_PLATFORM_NAME);
        (host, intruder, discord.len())
    }

    #[test]
    fn test_replace_rejects_stale_list() {
        let registry = SharedConnectorRegistry::default();
        let before = registry.connectors();

        let stock: ConnectorRef = Arc::new(StockConnector::new("Steam"));
        assert!(registry.replace(&before, vec![stock]).is_ok());

        match registry.replace(&before, Vec::new()) {
            Ok(()) => panic!("replace accepted a stale list"),
            Err(actual) => assert_eq!(actual.len(), 1),
        }
        assert_eq!(registry.connectors().len(), 1);
    }

    #[test]
    fn test_install_replaces_stock_connector() {
        let host = FakeHost::new_arc();
        let stock = Arc::new(StockConnector::new(DISCORD_PLATFORM_NAME));
        let steam = Arc::new(StockConnector::new("Steam"));
        host.add_connector(stock.clone());
        host.add_connector(steam.clone());

        let factory = RecordingFactory::new();
        let connector = install_rpc_connector(
            host.clone(),
            Arc::new(SettingsStore::default()),
            factory,
        )
        .unwrap();

        assert!(stock.is_disposed());
        assert!(!steam.is_disposed());
        assert_eq!(connector.state(), ConnectorState::Ready);

        let discord = connectors_of_kind(host.registry(), DISCORD_PLATFORM_NAME);
        assert_eq!(discord.len(), 1);
        assert_eq!(host.registry().connectors().len(), 2);
    }

    #[test]
    fn test_reinstall_keeps_exactly_one() {
        let host = FakeHost::new_arc();
        let settings = Arc::new(SettingsStore::default());
        let factory = RecordingFactory::new();

        let first =
            install_rpc_connector(host.clone(), Arc::clone(&settings), factory.clone()).unwrap();
        let second =
            install_rpc_connector(host.clone(), Arc::clone(&settings), factory.clone()).unwrap();

        assert_eq!(first.state(), ConnectorState::Disposed);
        assert_eq!(second.state(), ConnectorState::Ready);
        assert_eq!(
            connectors_of_kind(host.registry(), DISCORD_PLATFORM_NAME).len(),
            1
        );
    }

    #[test]
    fn test_failed_install_leaves_no_connector() {
        let host = FakeHost::new_arc();
        let stock = Arc::new(StockConnector::new(DISCORD_PLATFORM_NAME));
        host.add_connector(stock.clone());

        let result = install_rpc_connector(
            host.clone(),
            Arc::new(SettingsStore::default()),
            RecordingFactory::failing(),
        );

        assert!(result.is_err());
        assert!(stock.is_disposed());
        assert!(connectors_of_kind(host.registry(), DISCORD_PLATFORM_NAME).is_empty());
    }

    #[test]
    fn test_register_exclusive_evicts_same_kind() {
        let registry = SharedConnectorRegistry::default();
        let a: ConnectorRef = Arc::new(StockConnector::new(DISCORD_PLATFORM_NAME));
        let b: ConnectorRef = Arc::new(StockConnector::new(DISCORD_PLATFORM_NAME));

        assert!(register_exclusive(&registry, a).is_empty());
        let evicted = register_exclusive(&registry, b);

        assert_eq!(evicted.len(), 1);
        assert_eq!(registry.connectors().len(), 1);
    }

    #[test]
    fn test_install_retries_when_removal_races() {
        // First swap is the removal of stale connectors
        let (host, intruder, discord) = racing_install(1);

        assert!(intruder.is_disposed());
        assert_eq!(discord, 1);
        assert_eq!(host.registry().connectors().len(), 1);
    }

    #[test]
    fn test_install_evicts_connector_registered_concurrently() {
        // Second swap is the registration itself
        let (host, intruder, discord) = racing_install(2);

        assert!(intruder.is_disposed());
        assert_eq!(discord, 1);
        let remaining = host.registry().connectors();
        assert_eq!(remaining.len(), 1);
        let intruder_ref: ConnectorRef = intruder;
        assert!(!Arc::ptr_eq(&remaining[0], &intruder_ref));
    }
}
