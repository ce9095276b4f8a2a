use std::sync::Arc;

use crate::discord::TransportLogger;
use crate::error::RpcError;
use crate::host::{PlatformHost, WorldSnapshot};

use super::payload::PresencePayload;

/// Platform name shared by every Discord connector, ours and the host's stock one
pub const DISCORD_PLATFORM_NAME: &str = "Discord";

/// The Discord account the transport authenticated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUser {
    pub username: String,
    pub user_id: String,
}

/// A platform integration as the host sees it
pub trait PlatformConnector: Send + Sync {
    fn platform_name(&self) -> &'static str;

    /// Lower runs later when the host iterates its connectors
    fn priority(&self) -> i32;

    fn is_platform_name_unique(&self) -> bool;

    fn username(&self) -> Option<String>;

    fn platform_user_id(&self) -> Option<String>;

    fn initialize(&self, host: Arc<dyn PlatformHost>) -> Result<(), RpcError>;

    fn set_current_status(&self, world: &WorldSnapshot, is_private: bool, total_world_count: usize);

    fn clear_current_status(&self);

    /// Must be safe to call any number of times
    fn dispose(&self);
}

pub type TransportReadyCallback = Box<dyn Fn(PlatformUser) + Send + Sync>;

/// Client side of the presence IPC connection
pub trait PresenceTransport: Send + Sync {
    fn initialize(
        &mut self,
        logger: TransportLogger,
        on_ready: TransportReadyCallback,
    ) -> Result<(), RpcError>;

    /// Queue `payload` as the current activity
    fn push(&self, payload: &PresencePayload) -> Result<(), RpcError>;

    fn dispose(&mut self);
}

/// Hands out one transport per connector instance
pub trait TransportFactory: Send + Sync {
    fn create(&self, app_id: i64) -> Box<dyn PresenceTransport>;
}
