//! What the connector needs from the host application

use std::time::{Duration, SystemTime};

use url::Url;

use crate::presence::ConnectorRegistry;

/// A world as it looks at the moment of a status update
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    /// Raw world name, may contain rich-text markup
    pub name: String,
    pub localized_name: String,
    pub session_id: String,
    pub is_public: bool,
    pub is_private: bool,
    pub user_count: u32,
    pub max_users: u32,
    pub hide_from_listing: bool,
    /// When the local user joined the session
    pub session_begin: SystemTime,
    pub local_session_time: Duration,
    /// How long the world has been running locally
    pub local_world_time: Duration,
}

impl WorldSnapshot {
    pub fn listing(&self) -> WorldListing {
        WorldListing {
            is_public: self.is_public,
            max_users: self.max_users,
            hide_from_listing: self.hide_from_listing,
        }
    }
}

/// The parts of a known world that decide whether it counts as public
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldListing {
    pub is_public: bool,
    pub max_users: u32,
    pub hide_from_listing: bool,
}

impl WorldListing {
    pub fn counts_as_public(&self) -> bool {
        self.is_public && self.max_users > 1 && !self.hide_from_listing
    }
}

pub trait Localizer: Send + Sync {
    fn get_localized(&self, key: &str, args: &[(&str, String)]) -> String;
}

pub trait SessionLinks: Send + Sync {
    /// Public web page of a session
    fn session_web_uri(&self, session_id: &str) -> Url;

    /// Link that opens the session in the client
    fn session_join_uri(&self, session_id: &str) -> Url;
}

pub trait WorldDirectory: Send + Sync {
    /// Every world the host currently knows about, the focused one included
    fn worlds(&self) -> Vec<WorldListing>;
}

pub type HostReadyCallback = Box<dyn Fn() + Send + Sync>;

pub trait PlatformHost: Localizer + SessionLinks + WorldDirectory {
    fn discord_app_id(&self) -> i64;

    fn registry(&self) -> &dyn ConnectorRegistry;

    fn on_ready(&self, callback: HostReadyCallback);
}
