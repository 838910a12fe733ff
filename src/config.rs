//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::onboarding::ControllerSettings;

/// bcrypt rejects costs outside this range.
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Server configuration, read from `ONBOARDING_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    /// Accept legacy non-bcrypt stored credentials by plain comparison.
    pub allow_plaintext_login: bool,
    /// Upper bound for the bulk user clear.
    pub clear_timeout: Duration,
    /// When set, logs are also written to a daily file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5001,
            db_path: PathBuf::from("./data/onboarding.db"),
            bcrypt_cost: if cfg!(debug_assertions) { 4 } else { 10 },
            allow_plaintext_login: false,
            clear_timeout: Duration::from_secs(10),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bcrypt_cost = parse_or(
            "ONBOARDING_BCRYPT_COST",
            value("ONBOARDING_BCRYPT_COST"),
            defaults.bcrypt_cost,
        )?
        .clamp(*BCRYPT_COST_RANGE.start(), *BCRYPT_COST_RANGE.end());

        Ok(Self {
            bind: value("ONBOARDING_BIND").unwrap_or(defaults.bind),
            port: parse_or("ONBOARDING_PORT", value("ONBOARDING_PORT"), defaults.port)?,
            db_path: value("ONBOARDING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            bcrypt_cost,
            allow_plaintext_login: match value("ONBOARDING_ALLOW_PLAINTEXT_LOGIN") {
                Some(raw) => parse_flag("ONBOARDING_ALLOW_PLAINTEXT_LOGIN", &raw)?,
                None => defaults.allow_plaintext_login,
            },
            clear_timeout: Duration::from_secs(parse_or(
                "ONBOARDING_CLEAR_TIMEOUT_SECS",
                value("ONBOARDING_CLEAR_TIMEOUT_SECS"),
                defaults.clear_timeout.as_secs(),
            )?),
            log_dir: value("ONBOARDING_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Socket address string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// The subset of settings the onboarding controller uses.
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            bcrypt_cost: self.bcrypt_cost,
            allow_plaintext_login: self.allow_plaintext_login,
            clear_timeout: self.clear_timeout,
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a boolean"),
        }),
    }
}
