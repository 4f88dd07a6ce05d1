//! Process-wide configuration (C12), distinct from [`crate::domain::config`]
//! (game-rule constants). Layered with the `config` crate the way the
//! teacher layers `ANGZARR_CONFIG`/env overrides, but generalized to the
//! crate's own multi-source builder instead of a single YAML-then-env pass:
//! compiled-in defaults → `config.yaml` in the working directory → an
//! explicit CLI-given path → the file named by `GAMETABLES_CONFIG` →
//! environment variables prefixed `GAMETABLES__` (`__`-nested).

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    InMemory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::InMemory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    InMemory,
    Redis,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::InMemory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusBackend {
    Channel,
}

impl Default for BusBackend {
    fn default() -> Self {
        BusBackend::Channel
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub sqlite_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings { backend: StorageBackend::InMemory, sqlite_path: "./data/gametables.db".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub snapshot_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings { backend: CacheBackend::InMemory, redis_url: None, snapshot_ttl_secs: 6 * 60 * 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    pub backend: BusBackend,
}

impl Default for BusSettings {
    fn default() -> Self {
        BusSettings { backend: BusBackend::Channel }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub default_game_name: String,
    pub backfill_interval_secs: u64,
    pub backfill_gap_threshold: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            default_game_name: "five_hundred".to_string(),
            backfill_interval_secs: 30,
            backfill_gap_threshold: crate::background::DEFAULT_GAP_THRESHOLD,
        }
    }
}

/// Top-level server configuration. Every field carries a compiled-in
/// default via `#[serde(default)]`, so a config source only needs to
/// mention what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub bus: BusSettings,
    pub game: GameSettings,
    /// `tracing_subscriber::EnvFilter` directive string, read from
    /// `GAMETABLES_LOG` at startup rather than through this layered config
    /// (observability should work before config has finished loading).
    pub log_filter: String,
}

impl Settings {
    /// Loads the layered configuration: compiled defaults, `config.yaml`,
    /// an explicit `cli_path`, the file named by `GAMETABLES_CONFIG`, then
    /// `GAMETABLES__`-prefixed environment overrides, highest priority last.
    pub fn load(cli_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false));

        if let Some(path) = cli_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        if let Ok(env_path) = std::env::var("GAMETABLES_CONFIG") {
            builder = builder.add_source(config::File::with_name(&env_path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GAMETABLES")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|built| built.try_deserialize::<Settings>())
            .map_err(|e| AppError::parse("config", e.to_string()))
    }

    /// All-defaults, in-memory-backed configuration for unit/integration
    /// tests, bypassing file/env discovery entirely.
    pub fn for_test() -> Self {
        Settings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_test_uses_in_memory_backends() {
        let settings = Settings::for_test();
        assert_eq!(settings.storage.backend, StorageBackend::InMemory);
        assert_eq!(settings.cache.backend, CacheBackend::InMemory);
        assert_eq!(settings.game.default_game_name, "five_hundred");
    }

    #[test]
    fn env_override_changes_server_port() {
        std::env::set_var("GAMETABLES__SERVER__PORT", "9001");
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.port, 9001);
        std::env::remove_var("GAMETABLES__SERVER__PORT");
    }
}
