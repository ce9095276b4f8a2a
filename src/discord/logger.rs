use std::fmt::Display;
use std::sync::Arc;

use crate::settings::SettingsStore;

const LOG_TARGET: &str = "discord_rpc::transport";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportLogLevel {
    Trace,
    Info,
    Warning,
    Error,
}

/// Routes transport messages into `tracing`.
///
/// Trace output only shows up while `debug_mode` is on; the setting is checked
/// on every call so toggling it takes effect immediately.
#[derive(Clone)]
pub struct TransportLogger {
    settings: Arc<SettingsStore>,
}

impl TransportLogger {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self { settings }
    }

    pub fn level(&self) -> TransportLogLevel {
        if self.settings.debug_mode() {
            TransportLogLevel::Trace
        } else {
            TransportLogLevel::Info
        }
    }

    pub fn enabled(&self, level: TransportLogLevel) -> bool {
        level >= self.level()
    }

    pub fn trace(&self, message: impl Display) {
        if self.enabled(TransportLogLevel::Trace) {
            tracing::debug!(target: LOG_TARGET, "Discord:Trace - {}", message);
        }
    }

    pub fn info(&self, message: impl Display) {
        if self.enabled(TransportLogLevel::Info) {
            tracing::info!(target: LOG_TARGET, "Discord:Info - {}", message);
        }
    }

    pub fn warning(&self, message: impl Display) {
        if self.enabled(TransportLogLevel::Warning) {
            tracing::warn!(target: LOG_TARGET, "Discord:Warning - {}", message);
        }
    }

    pub fn error(&self, message: impl Display) {
        if self.enabled(TransportLogLevel::Error) {
            tracing::error!(target: LOG_TARGET, "Discord:Error - {}", message);
        }
    }
}
