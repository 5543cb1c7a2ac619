//! Configuration file support for qso-relay.
//!
//! Loads settings from `~/.config/qso-relay/config.toml` on Linux
//! (or platform-appropriate location on other OSes). Every key is optional;
//! missing keys take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::directory::DirectoryConfig;
use crate::lookup::LookupSettings;
use crate::transmit::DEFAULT_ADIF_PORT;
use crate::validate::validate_report;

/// Last known window placement, kept for graphical front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Application configuration loaded from TOML file.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IPv4 address of the logging program receiving ADIF records.
    pub udp_ip: String,

    /// UDP port of the logging program.
    pub udp_port: u16,

    /// Signal report pre-filled as sent.
    pub default_rst_sent: String,

    /// Signal report pre-filled as received.
    pub default_rst_recv: String,

    /// Clear the callsign after a successful log.
    pub auto_clear_call: bool,

    /// QRZ.com username.
    pub qrz_username: String,

    /// QRZ.com password.
    pub qrz_password: String,

    /// Look callsigns up as they are typed.
    pub auto_lookup: bool,

    /// Show the station photo returned by the directory.
    pub show_photo: bool,

    pub window_geometry: Option<WindowGeometry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udp_ip: "192.168.1.100".to_string(),
            udp_port: DEFAULT_ADIF_PORT,
            default_rst_sent: "59".to_string(),
            default_rst_recv: "59".to_string(),
            auto_clear_call: true,
            qrz_username: String::new(),
            qrz_password: String::new(),
            auto_lookup: true,
            show_photo: true,
            window_geometry: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("udp_ip", &self.udp_ip)
            .field("udp_port", &self.udp_port)
            .field("default_rst_sent", &self.default_rst_sent)
            .field("default_rst_recv", &self.default_rst_recv)
            .field("auto_clear_call", &self.auto_clear_call)
            .field("qrz_username", &self.qrz_username)
            .field("qrz_password", &"<REDACTED>")
            .field("auto_lookup", &self.auto_lookup)
            .field("show_photo", &self.show_photo)
            .field("window_geometry", &self.window_geometry)
            .finish()
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit path, defaulting if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Save configuration to the default config file location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("No configuration directory on this platform"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("qso-relay/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        self.udp_ip
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|_| anyhow::anyhow!("Invalid udp_ip: {:?} is not an IPv4 address", self.udp_ip))?;
        if self.udp_port == 0 {
            anyhow::bail!("Invalid udp_port: must be between 1 and 65535");
        }
        if !validate_report(&self.default_rst_sent) {
            anyhow::bail!("Invalid default_rst_sent: {:?}", self.default_rst_sent);
        }
        if !validate_report(&self.default_rst_recv) {
            anyhow::bail!("Invalid default_rst_recv: {:?}", self.default_rst_recv);
        }
        Ok(())
    }

    /// Whether both directory credentials are set.
    pub fn has_directory_credentials(&self) -> bool {
        !self.qrz_username.trim().is_empty() && !self.qrz_password.trim().is_empty()
    }

    /// Directory client settings derived from the stored credentials.
    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig::with_credentials(&self.qrz_username, &self.qrz_password)
    }

    /// Lookup scheduling settings derived from the auto-lookup toggle.
    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            enabled: self.auto_lookup,
            ..Default::default()
        }
    }
}
