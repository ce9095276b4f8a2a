use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::RpcError;

const SETTINGS_DIR: &str = "ResoniteDiscordRpc";
const SETTINGS_FILE: &str = "settings.json";

/// How much of the current world is shared with Discord
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RichPresenceLevel {
    /// Nothing is shown
    None,
    /// Only "in a private world", even for public sessions
    Basic,
    /// Full details for public sessions
    #[default]
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichPresenceSettings {
    pub show_thumbnail: bool,
    pub show_session_info_link: bool,
    pub show_join_button: bool,
    pub rich_presence_level: RichPresenceLevel,
    pub debug_mode: bool,
}

impl Default for RichPresenceSettings {
    fn default() -> Self {
        Self {
            show_thumbnail: true,
            show_session_info_link: true,
            show_join_button: true,
            rich_presence_level: RichPresenceLevel::Full,
            debug_mode: false,
        }
    }
}

impl RichPresenceSettings {
    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags {
            show_thumbnail: self.show_thumbnail,
            show_session_info_link: self.show_session_info_link,
            show_join_button: self.show_join_button,
        }
    }
}

/// Optional parts of the public presence, toggled by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub show_thumbnail: bool,
    pub show_session_info_link: bool,
    pub show_join_button: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        RichPresenceSettings::default().feature_flags()
    }
}

pub fn default_settings_path() -> Result<PathBuf, RpcError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| RpcError::Settings("Failed to get config directory".to_string()))?
        .join(SETTINGS_DIR);

    fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join(SETTINGS_FILE))
}

pub fn load_settings(path: &Path) -> Result<RichPresenceSettings, RpcError> {
    tracing::debug!("Loading settings from {}", path.display());

    if !path.exists() {
        return Ok(RichPresenceSettings::default());
    }

    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_settings(path: &Path, settings: &RichPresenceSettings) -> Result<(), RpcError> {
    tracing::debug!("Saving settings to {}", path.display());

    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

pub type SettingsCallback = Arc<dyn Fn(&RichPresenceSettings) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Live settings shared between the host and the connector.
///
/// Reads never touch the disk, so they are safe to call from the world tick.
/// Writes notify every subscriber with the new value, after the write lock has
/// been released.
pub struct SettingsStore {
    current: RwLock<RichPresenceSettings>,
    subscribers: Mutex<Vec<(SubscriptionId, SettingsCallback)>>,
    next_id: AtomicU64,
    path: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(settings: RichPresenceSettings) -> Self {
        Self {
            current: RwLock::new(settings),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            path: None,
        }
    }

    /// Load from `path` and persist every later update back to it
    pub fn open(path: PathBuf) -> Result<Self, RpcError> {
        let settings = load_settings(&path)?;
        let mut store = Self::new(settings);
        store.path = Some(path);
        Ok(store)
    }

    pub fn get(&self) -> RichPresenceSettings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .feature_flags()
    }

    pub fn rich_presence_level(&self) -> RichPresenceLevel {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .rich_presence_level
    }

    pub fn debug_mode(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .debug_mode
    }

    pub fn update(&self, f: impl FnOnce(&mut RichPresenceSettings)) {
        let changed = {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            let before = current.clone();
            f(&mut *current);
            (*current != before).then(|| current.clone())
        };

        let Some(settings) = changed else {
            return;
        };

        if let Some(path) = &self.path {
            if let Err(e) = save_settings(path, &settings) {
                tracing::warn!("Failed to persist settings: {}", e);
            }
        }

        self.notify(&settings);
    }

    pub fn set_rich_presence_level(&self, level: RichPresenceLevel) {
        self.update(|s| s.rich_presence_level = level);
    }

    pub fn subscribe(&self, callback: SettingsCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(sub, _)| *sub != id);
    }

    fn notify(&self, settings: &RichPresenceSettings) {
        // Callbacks may subscribe or unsubscribe, so call them on a copy
        let callbacks: Vec<SettingsCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(settings);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(RichPresenceSettings::default())
    }
}
