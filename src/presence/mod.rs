mod connector;
mod payload;
mod registry;
mod traits;
mod watcher;

pub use connector::{ConnectorState, RpcConnector};
pub use payload::{
    strip_rich_text, PartyPrivacy, PayloadBuilder, PresenceAssets, PresenceButton, PresenceParty,
    PresencePayload, PresenceTemplate, DEFAULT_LARGE_IMAGE, DEFAULT_SMALL_IMAGE, MAX_BUTTONS,
    THUMBNAIL_MIN_WORLD_TIME,
};
pub use registry::{
    connectors_of_kind, install_rpc_connector, register_exclusive, remove_connectors_of_kind,
    ConnectorList, ConnectorRef, ConnectorRegistry, SharedConnectorRegistry,
};
pub use traits::{
    PlatformConnector, PlatformUser, PresenceTransport, TransportFactory, TransportReadyCallback,
    DISCORD_PLATFORM_NAME,
};
pub use watcher::SettingsWatcher;
