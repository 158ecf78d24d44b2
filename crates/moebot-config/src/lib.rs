//! Configuration for MoeBot sessions.
//!
//! TOML profiles, local-key resolution (env + keyring + plaintext), and
//! translation to `moebot_core::SessionConfig`. The session engine never
//! reads files itself; applications load a profile here and hand the
//! result to `MoeBot::new`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use moebot_core::{DeviceIdentity, ProtocolVersion, SessionConfig, Timing};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const KEYRING_SERVICE: &str = "moebot";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no local key configured for profile '{profile}'")]
    NoLocalKey { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    /// Session tuning shared by every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named mower profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile` when `name` is
    /// `None`. Returns the resolved name with the profile.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_receive_window")]
    pub receive_window_secs: u64,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub command_queue_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            status_interval_secs: default_status_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            receive_window_secs: default_receive_window(),
            retry_backoff_secs: default_retry_backoff(),
            wait_timeout_secs: default_wait_timeout(),
            command_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_status_interval() -> u64 {
    30
}
fn default_heartbeat_interval() -> u64 {
    12
}
fn default_receive_window() -> u64 {
    5
}
fn default_retry_backoff() -> u64 {
    2
}
fn default_wait_timeout() -> u64 {
    10
}
fn default_queue_capacity() -> usize {
    20
}

/// One mower.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Tuya device id.
    pub device_id: String,

    /// LAN address of the mower (e.g., "192.168.1.50").
    pub address: String,

    /// Local key (plaintext -- prefer keyring or env var).
    pub local_key: Option<String>,

    /// Environment variable name containing the local key.
    pub local_key_env: Option<String>,

    /// Protocol versions to probe, most preferred first.
    pub protocol_versions: Option<Vec<ProtocolVersion>>,

    /// Override the command wait timeout.
    pub wait_timeout_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("xyz", "whyte", "moebot").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("moebot");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. Missing files are not an error: built-in
/// defaults and `MOEBOT_` environment variables still apply.
///
/// Nested keys use a double underscore, e.g.
/// `MOEBOT_DEFAULTS__WAIT_TIMEOUT_SECS=20`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MOEBOT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Local key resolution ────────────────────────────────────────────

/// Resolve the device's local key: env var named by the profile, then the
/// system keyring, then plaintext in the config.
pub fn resolve_local_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's local_key_env → env var lookup
    if let Some(val) = profile
        .local_key_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(secret) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.get_password())
    {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(key) = &profile.local_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoLocalKey {
        profile: profile_name.into(),
    })
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/local-key")
}

// ── Translation ─────────────────────────────────────────────────────

impl Defaults {
    pub fn timing(&self) -> Timing {
        Timing {
            status_interval: Duration::from_secs(self.status_interval_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            receive_window: Duration::from_secs(self.receive_window_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
        }
    }
}

/// Build a `SessionConfig` from a profile and the shared defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    if profile.device_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "device_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let address: IpAddr = profile
        .address
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "address".into(),
            reason: format!("not an IP address: {}", profile.address),
        })?;

    if defaults.command_queue_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "command_queue_capacity".into(),
            reason: "must be at least 1".into(),
        });
    }

    let local_key = resolve_local_key(profile, profile_name)?;
    let identity = DeviceIdentity::new(profile.device_id.trim(), address, local_key);

    let mut timing = defaults.timing();
    if let Some(secs) = profile.wait_timeout_secs {
        timing.wait_timeout = Duration::from_secs(secs);
    }

    let mut config = SessionConfig::new(identity).with_timing(timing);
    config.command_queue_capacity = defaults.command_queue_capacity;
    if let Some(versions) = profile.protocol_versions.as_ref().filter(|v| !v.is_empty()) {
        config.protocol_versions.clone_from(versions);
    }
    Ok(config)
}

/// Load the config and build the session config for one profile.
pub fn load_session_config(profile_name: Option<&str>) -> Result<SessionConfig, ConfigError> {
    let config = load_config()?;
    let (name, profile) = config.profile(profile_name)?;
    profile_to_session_config(profile, name, &config.defaults)
}
