//! Layered session configuration.
//!
//! Values are resolved in order, later layers winning:
//! 1. built-in defaults
//! 2. `<workspace>/.sitecraft/settings.json`
//! 3. `SITECRAFT_*` environment variables
//!
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use craft_client::RetryConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::types::is_valid_user_id;

/// Directory under the workspace holding local state.
pub const STATE_DIR: &str = ".sitecraft";

pub const ENV_BASE_URL: &str = "SITECRAFT_BASE_URL";
pub const ENV_USER_ID: &str = "SITECRAFT_USER_ID";
pub const ENV_TIMEOUT_MS: &str = "SITECRAFT_TIMEOUT_MS";
pub const ENV_MAX_ATTEMPTS: &str = "SITECRAFT_MAX_ATTEMPTS";

/// Everything a session needs to know about its surroundings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// Session identifier; generated and saved on first use when empty
    pub user_id: String,
    #[serde(skip)]
    pub workspace: PathBuf,
    pub retry: RetryConfig,
    /// Root of the local project store (defaults under the state directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_root: Option<PathBuf>,
    /// Quiet period for debounced preference writes
    pub debounce_ms: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            user_id: String::new(),
            workspace: PathBuf::from("."),
            retry: RetryConfig::default(),
            store_root: None,
            debounce_ms: 500,
        }
    }
}

impl SiteConfig {
    /// Resolve configuration for a workspace from file and process environment.
    pub fn load(workspace: impl AsRef<Path>) -> ChatResult<Self> {
        let mut config = Self::from_file(workspace)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the settings file, if there is one.
    pub fn from_file(workspace: impl AsRef<Path>) -> ChatResult<Self> {
        let workspace = workspace.as_ref();
        let path = settings_path(workspace);

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<SiteConfig>(&content).map_err(|e| {
                ChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            debug!("No settings at {}, using defaults", path.display());
            SiteConfig::default()
        };

        config.workspace = workspace.to_path_buf();
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ChatResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            self.user_id = user_id;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.retry.timeout_ms = parse_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &raw)?;
        }
        Ok(())
    }

    /// Reject a session identifier that cannot be used as a path segment.
    ///
    /// An empty identifier is accepted; [`ensure_user_id`](Self::ensure_user_id)
    /// fills it in.
    pub fn validate(&self) -> ChatResult<()> {
        if self.user_id.is_empty() || is_valid_user_id(&self.user_id) {
            Ok(())
        } else {
            Err(ChatError::Config(format!(
                "user id '{}' may only contain letters, digits, '-' and '_'",
                self.user_id
            )))
        }
    }

    /// Make sure a session identifier exists, saving a new one if needed.
    pub fn ensure_user_id(&mut self) -> &str {
        if self.user_id.trim().is_empty() {
            self.user_id = Uuid::new_v4().to_string();
            info!("Created session identifier {}", self.user_id);
            if let Err(e) = self.save() {
                warn!("Could not save session identifier: {}", e);
            }
        }
        &self.user_id
    }

    /// Switch to a brand-new session identifier and save it.
    ///
    /// The previous session's stored conversation is left untouched.
    pub fn start_new_session(&mut self) -> ChatResult<&str> {
        let previous = std::mem::replace(&mut self.user_id, Uuid::new_v4().to_string());
        info!("Started session {} (previous: {})", self.user_id, previous);
        self.save()?;
        Ok(&self.user_id)
    }

    /// Write the settings file.
    pub fn save(&self) -> ChatResult<()> {
        let path = settings_path(&self.workspace);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Live preview artifact for this session.
    pub fn preview_url(&self) -> String {
        format!("{}/preview/{}", self.base_url(), self.user_id)
    }

    pub fn store_root(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(|| self.workspace.join(STATE_DIR).join("store"))
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

/// `<workspace>/.sitecraft/settings.json`
pub fn settings_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("settings.json")
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> ChatResult<N> {
    raw.trim()
        .parse()
        .map_err(|_| ChatError::Config(format!("{} must be a number, got '{}'", key, raw)))
}
