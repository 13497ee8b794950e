// ⚙️ Configuration
// defaults → optional JSON file (FLOOD_RISK_CONFIG) → environment overrides

use crate::error::ConfigError;
use crate::import::{DEFAULT_ACTOR, DEFAULT_IMPORT_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_VAR: &str = "FLOOD_RISK_CONFIG";
pub const DB_VAR: &str = "FLOOD_RISK_DB";
pub const TIMEOUT_VAR: &str = "FLOOD_RISK_IMPORT_TIMEOUT_SECS";
pub const ACTOR_VAR: &str = "FLOOD_RISK_ACTOR";

pub const DEFAULT_DATABASE_PATH: &str = "flood_risk.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Overall deadline of one bulk import
    pub import_timeout: Duration,
    /// Identity written to the audit trail
    pub actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

/// On-disk shape; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    import_timeout_secs: Option<u64>,
    actor: Option<String>,
}

impl Config {
    /// Load from `.env`, the process environment and the optional config file
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file = std::env::var(CONFIG_FILE_VAR).ok().map(PathBuf::from);
        Self::from_sources(file.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build from an optional file and an environment lookup
    pub fn from_sources(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = file {
            config.apply_file(&read_file(path)?)?;
        }

        if let Some(db) = env(DB_VAR).filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(db.trim());
        }

        if let Some(raw) = env(TIMEOUT_VAR) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: TIMEOUT_VAR.to_string(),
                value: raw.clone(),
            })?;
            config.import_timeout = timeout_from_secs(TIMEOUT_VAR, secs)?;
        }

        if let Some(actor) = env(ACTOR_VAR).filter(|v| !v.trim().is_empty()) {
            config.actor = actor.trim().to_string();
        }

        log::debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    fn apply_file(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(path) = &file.database_path {
            self.database_path = path.clone();
        }
        if let Some(secs) = file.import_timeout_secs {
            self.import_timeout = timeout_from_secs("import_timeout_secs", secs)?;
        }
        if let Some(actor) = &file.actor {
            self.actor = actor.clone();
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn timeout_from_secs(var: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
