use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "tradepost.toml",
    "config/tradepost.toml",
    "crates/config/tradepost.toml",
    "../tradepost.toml",
    "../config/tradepost.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub presence: PresenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tradepost.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Presence reaper settings. A party whose connection stops sending pings is
/// marked offline after `idle_timeout_seconds`; zero disables the reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "PresenceConfig::default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "PresenceConfig::default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl PresenceConfig {
    const fn default_idle_timeout() -> u64 {
        90
    }

    const fn default_sweep_interval() -> u64 {
        30
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: Self::default_idle_timeout(),
            sweep_interval_seconds: Self::default_sweep_interval(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use tradepost_config::load;
///
/// std::env::remove_var("TRADEPOST_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default(
            "presence.idle_timeout_seconds",
            i64::try_from(defaults.presence.idle_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "presence.sweep_interval_seconds",
            i64::try_from(defaults.presence.sweep_interval_seconds).unwrap_or(i64::MAX),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("TRADEPOST").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("TRADEPOST_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via TRADEPOST_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn load_uses_defaults_without_file_or_env() {
        std::env::remove_var("TRADEPOST_CONFIG");
        std::env::remove_var("TRADEPOST__HTTP__PORT");

        let config = load().expect("defaults should load");
        assert_eq!(config.http.port, 7080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.presence.idle_timeout_seconds, 90);
    }

    #[test]
    #[serial]
    fn environment_overrides_take_precedence() {
        std::env::remove_var("TRADEPOST_CONFIG");
        std::env::set_var("TRADEPOST__HTTP__PORT", "9999");

        let config = load().expect("configuration should load");
        assert_eq!(config.http.port, 9999);

        std::env::remove_var("TRADEPOST__HTTP__PORT");
    }

    #[test]
    #[serial]
    fn config_file_is_loaded_when_pointed_at() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tradepost.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[database]").unwrap();
        writeln!(file, "url = \"sqlite://custom.db\"").unwrap();
        writeln!(file, "max_connections = 3").unwrap();

        std::env::set_var("TRADEPOST_CONFIG", path.to_str().unwrap());

        let config = load().expect("configuration should load");
        assert_eq!(config.database.url, "sqlite://custom.db");
        assert_eq!(config.database.max_connections, 3);

        std::env::remove_var("TRADEPOST_CONFIG");
    }
}
