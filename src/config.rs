// ⚙️ Engine Configuration
//
// Resolution order (later wins):
//   1. built-in defaults
//   2. TOML file (--config or DRAW_ENGINE_CONFIG)
//   3. environment overrides (DRAW_ENGINE_DATABASE, DRAW_ENGINE_BIND,
//      DRAW_ENGINE_RECONCILE_SECRET)
//
// An empty reconcile secret is the same as no secret: the reconcile endpoint
// then refuses every request.

use crate::error::{EngineError, Result};
use crate::matcher::DEFAULT_MATCH_THRESHOLD;
use crate::stuck_invoices::DEFAULT_STUCK_AFTER_MINUTES;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_CONFIG_PATH: &str = "DRAW_ENGINE_CONFIG";
pub const ENV_DATABASE: &str = "DRAW_ENGINE_DATABASE";
pub const ENV_BIND: &str = "DRAW_ENGINE_BIND";
pub const ENV_RECONCILE_SECRET: &str = "DRAW_ENGINE_RECONCILE_SECRET";

fn default_database_path() -> PathBuf {
    PathBuf::from("data/draw_engine.db")
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_stuck_after_minutes() -> i64 {
    DEFAULT_STUCK_AFTER_MINUTES
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_actor() -> String {
    "draw-engine".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP listen address for draw-server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Pre-shared secret for the stuck-invoice endpoint
    #[serde(default)]
    pub reconcile_secret: Option<String>,

    #[serde(default = "default_stuck_after_minutes")]
    pub stuck_after_minutes: i64,

    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Recorded as the actor of audit events written by this process
    #[serde(default = "default_actor")]
    pub actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: default_database_path(),
            bind_address: default_bind_address(),
            reconcile_secret: None,
            stuck_after_minutes: default_stuck_after_minutes(),
            match_threshold: default_match_threshold(),
            actor: default_actor(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::InvalidArgument(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidArgument(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE) {
            debug!(path = %path, "database path from environment");
            self.database_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_address = bind;
        }
        if let Some(secret) = lookup(ENV_RECONCILE_SECRET) {
            self.reconcile_secret = Some(secret);
        }
        self
    }

    /// Full resolution: explicit path, else DRAW_ENGINE_CONFIG, else defaults;
    /// then environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit_path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(explicit_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG_PATH).map(PathBuf::from));

        let base = match file_path {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => EngineConfig::default(),
        };

        let config = base.with_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stuck_after_minutes < 0 {
            return Err(EngineError::InvalidArgument(format!(
                "stuck_after_minutes must be >= 0, got {}",
                self.stuck_after_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(EngineError::InvalidArgument(format!(
                "match_threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if self.actor.trim().is_empty() {
            return Err(EngineError::MissingField("actor"));
        }
        Ok(())
    }

    /// Configured secret, with "" treated as unset.
    pub fn reconcile_secret(&self) -> Option<&str> {
        self.reconcile_secret.as_deref().filter(|s| !s.is_empty())
    }
}
