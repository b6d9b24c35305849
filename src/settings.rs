use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dbus::{status_interface, DEFAULT_SERVICE_ROOT};

const SETTINGS_ENV: &str = "DBUS_STATUS_SETTINGS";
const SETTINGS_DIR: &str = "dbus-status";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    service_root: String,
    bus: BusKind,
    request_name: bool,
    statuses_file: Option<PathBuf>,
    log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_root: DEFAULT_SERVICE_ROOT.to_string(),
            bus: BusKind::default(),
            request_name: true,
            statuses_file: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Settings from `$DBUS_STATUS_SETTINGS` or the user config directory.
    ///
    /// A missing file yields defaults; a broken one is reported and ignored.
    pub fn new() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn settings_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(SETTINGS_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn service_root(&self) -> &str {
        &self.service_root
    }

    pub fn status_interface(&self) -> String {
        status_interface(&self.service_root)
    }

    pub fn bus(&self) -> BusKind {
        self.bus
    }

    /// Whether the daemon should own `service_root` as a well-known name.
    pub fn request_name(&self) -> bool {
        self.request_name
    }

    pub fn statuses_file(&self) -> Option<&Path> {
        self.statuses_file.as_deref()
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }
}
