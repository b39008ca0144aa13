//! Configuration: server settings from the environment and per-module
//! settings from `application/<module>/configs/app.env`.
//!
//! Module files use the same `KEY=value` format as `.env` files and are
//! parsed with `dotenvy`, without touching the process environment.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::is_secure_path;

/// Server configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Directory containing `application/`
    pub root: PathBuf,
    /// Module used when the URL does not name one
    pub default_module: String,
    /// Key used to sign session cookies (raw bytes)
    pub session_secret: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            root: PathBuf::from("."),
            default_module: "pc".to_string(),
            session_secret: b"test_session_secret_32_bytes!!!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            root: env::var("TRELLIS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            default_module: env::var("DEFAULT_MODULE").unwrap_or_else(|_| "pc".to_string()),
            session_secret: env::var("SESSION_SECRET")
                .map_err(|_| ConfigError::Missing("SESSION_SECRET".to_string()))?
                .trim()
                .as_bytes()
                .to_vec(),
        })
    }
}

/// Application environment, selecting how errors are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                key: "ENVIRONMENT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Session cookie settings from the module file.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub name: String,
    /// Cookie lifetime; `None` means a browser-session cookie.
    pub lifetime: Option<Duration>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    /// Stored data is dropped after this long without a save
    pub gc_max_lifetime: Duration,
}

/// Idle lifetime of stored session data when the module sets none.
pub const DEFAULT_SESSION_GC_MAXLIFETIME: Duration = Duration::from_secs(1440);

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: "TRELLISSESSID".to_string(),
            lifetime: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            gc_max_lifetime: DEFAULT_SESSION_GC_MAXLIFETIME,
        }
    }
}

/// Per-module configuration.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub module: String,
    pub environment: Environment,
    /// SQLite database file used by models of this module
    pub database_path: Option<PathBuf>,
    /// Root of the result cache (`<cache_dir>/db/<table>/`)
    pub cache_dir: PathBuf,
    /// Lifetime of cached results; `None` keeps them until cleaned
    pub cache_lifetime: Option<Duration>,
    pub error_log: PathBuf,
    pub exception_log: PathBuf,
    pub log_errors: bool,
    pub notify_errors: bool,
    pub display_errors: bool,
    pub error_notify_delay: Duration,
    pub exception_notify_delay: Duration,
    pub notify_webhook_url: Option<String>,
    pub notify_from: String,
    pub notify_to: String,
    pub session: SessionSettings,
}

impl ModuleConfig {
    /// Path of the config file for a module.
    pub fn path_for(root: &Path, module: &str) -> PathBuf {
        module_dir(root, module).join("configs").join("app.env")
    }

    /// Load and parse the config file of a module.
    pub fn load(root: &Path, module: &str) -> Result<Self, ConfigError> {
        let path = Self::path_for(root, module);
        if !is_secure_path(&path) {
            return Err(ConfigError::IllegalPath(path));
        }

        let iter = dotenvy::from_path_iter(&path).map_err(|e| ConfigError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            values.insert(key, value);
        }

        tracing::debug!(module, path = %path.display(), keys = values.len(), "Loaded module config");
        Self::from_values(root, module, &values)
    }

    /// Build a config from already-parsed key/value pairs.
    pub fn from_values(
        root: &Path,
        module: &str,
        values: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let dir = module_dir(root, module);
        let get = |key: &str| values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let path_or = |key: &str, default: PathBuf| {
            get(key)
                .map(|v| resolve(&dir, v))
                .unwrap_or(default)
        };

        let environment = get("ENVIRONMENT")
            .ok_or_else(|| ConfigError::Missing("ENVIRONMENT".to_string()))?
            .parse::<Environment>()?;

        let session_defaults = SessionSettings::default();
        let session = SessionSettings {
            name: get("SESSION_NAME")
                .map(str::to_string)
                .unwrap_or(session_defaults.name),
            lifetime: parse_secs(values, "SESSION_LIFETIME_SECS")?.filter(|d| !d.is_zero()),
            path: get("SESSION_COOKIE_PATH")
                .map(str::to_string)
                .unwrap_or(session_defaults.path),
            domain: get("SESSION_COOKIE_DOMAIN").map(str::to_string),
            secure: parse_flag(values, "SESSION_COOKIE_SECURE", session_defaults.secure)?,
            http_only: parse_flag(values, "SESSION_COOKIE_HTTPONLY", session_defaults.http_only)?,
            gc_max_lifetime: parse_secs(values, "SESSION_GC_MAXLIFETIME_SECS")?
                .filter(|d| !d.is_zero())
                .unwrap_or(session_defaults.gc_max_lifetime),
        };

        Ok(Self {
            module: module.to_string(),
            environment,
            database_path: get("DATABASE_PATH").map(|v| resolve(&dir, v)),
            cache_dir: path_or("CACHE_DIR", dir.join("cache")),
            cache_lifetime: parse_secs(values, "CACHE_LIFETIME_SECS")?,
            error_log: path_or("ERROR_LOG", dir.join("logs").join("error.log")),
            exception_log: path_or("EXCEPTION_LOG", dir.join("logs").join("exception.log")),
            log_errors: parse_flag(values, "LOG_ERRORS", true)?,
            notify_errors: parse_flag(values, "NOTIFY_ERRORS", false)?,
            display_errors: parse_flag(
                values,
                "DISPLAY_ERRORS",
                environment == Environment::Development,
            )?,
            error_notify_delay: parse_secs(values, "ERROR_NOTIFY_DELAY_SECS")?
                .unwrap_or(Duration::from_secs(3600)),
            exception_notify_delay: parse_secs(values, "EXCEPTION_NOTIFY_DELAY_SECS")?
                .unwrap_or(Duration::from_secs(3600)),
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL").map(str::to_string),
            notify_from: get("NOTIFY_FROM")
                .unwrap_or("System Autogenerated")
                .to_string(),
            notify_to: get("NOTIFY_TO").unwrap_or("Support").to_string(),
            session,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn module_dir(root: &Path, module: &str) -> PathBuf {
    root.join("application").join(module)
}

/// Relative paths in a module file are relative to the module directory.
fn resolve(dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        dir.join(path)
    }
}

fn parse_flag(
    values: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match values.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: v.clone(),
            }),
        },
    }
}

fn parse_secs(
    values: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    match values.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: v.to_string(),
            }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },

    #[error("The config filename '{0}' contains illegal characters")]
    IllegalPath(PathBuf),

    #[error("Cannot access config file '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Cannot access modules directory '{path}': {reason}")]
    ModulesDir { path: PathBuf, reason: String },
}
