//! Discord Rich Presence for Resonite.
//!
//! Replaces the host's stock Discord connector with [`RpcConnector`], which
//! derives the activity from the focused world and the user's privacy settings.

mod error;

pub mod discord;
pub mod host;
pub mod logging;
pub mod presence;
pub mod settings;

#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;

pub use error::RpcError;
pub use presence::{install_rpc_connector, PlatformConnector, RpcConnector};

use host::PlatformHost;
use presence::TransportFactory;
use settings::{default_settings_path, SettingsStore};

/// What stays alive from engine init until the plugin is unloaded
pub struct RpcPlugin {
    settings: Arc<SettingsStore>,
    _log_guard: WorkerGuard,
}

impl RpcPlugin {
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }
}

/// Load settings and start logging from their default locations, then hook the
/// host's ready signal
pub fn start(
    host: &Arc<dyn PlatformHost>,
    factory: Arc<dyn TransportFactory>,
) -> Result<RpcPlugin, RpcError> {
    start_in(
        host,
        default_settings_path()?,
        &logging::default_log_directory(),
        factory,
    )
}

pub fn start_in(
    host: &Arc<dyn PlatformHost>,
    settings_path: PathBuf,
    log_dir: &Path,
    factory: Arc<dyn TransportFactory>,
) -> Result<RpcPlugin, RpcError> {
    let settings = Arc::new(SettingsStore::open(settings_path)?);
    let log_guard = logging::init_logging(log_dir, settings.debug_mode());

    on_engine_init(host, Arc::clone(&settings), factory);

    Ok(RpcPlugin {
        settings,
        _log_guard: log_guard,
    })
}

/// Install the Discord RPC connector every time the host reports it is ready
pub fn on_engine_init(
    host: &Arc<dyn PlatformHost>,
    settings: Arc<SettingsStore>,
    factory: Arc<dyn TransportFactory>,
) {
    let weak_host = Arc::downgrade(host);
    host.on_ready(Box::new(move || {
        let Some(host) = weak_host.upgrade() else {
            return;
        };
        // Failures are logged inside and leave the host without a Discord connector
        let _ = install_rpc_connector(host, Arc::clone(&settings), Arc::clone(&factory));
    }));
}
