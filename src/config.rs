// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings
//!
//! Settings are loaded once at startup and written back at shutdown. The API
//! token is additionally exposed as a shared [`Credential`] handle so the
//! lookup client can clear it when the service rejects it.

use crate::constants::{api, app_info, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Environment variable overriding the stored token for one run
pub const TOKEN_ENV: &str = "BARCODE_SCANNER_TOKEN";

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// ean-search.org API token, empty when not configured
    pub token: String,
    /// Handle of the last camera used for scanning
    pub last_camera: Option<String>,
    /// Base URL of the lookup API
    pub api_base_url: String,
    /// Timeout of a single lookup request
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            last_camera: None,
            api_base_url: api::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: timing::LOOKUP_TIMEOUT_SECS,
        }
    }
}

/// Location of the settings file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the user's configuration directory
    ///
    /// `~/.config/ean-search.org/BarcodeScanner.json` on Linux.
    pub fn default_location() -> Self {
        let base = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
        Self::new(
            base.join(app_info::ORGANIZATION)
                .join(format!("{}.json", app_info::APP_NAME)),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings
    ///
    /// A missing file yields the defaults. A corrupt file is logged and also
    /// yields the defaults, it is overwritten by the next save.
    pub fn load(&self) -> Config {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %self.path.display(), "Settings loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Ignoring corrupt settings file");
                    Config::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read settings");
                Config::default()
            }
        }
    }

    /// Write the settings, creating parent directories as needed
    pub fn save(&self, config: &Config) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)
            .map_err(|e| AppError::Storage(format!("{}: {}", self.path.display(), e)))?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// Shared API token
///
/// Cloning shares the underlying value. The user may change it at any time
/// and the lookup client clears it when the service reports it invalid.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    token: Arc<RwLock<String>>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token.into())),
        }
    }

    /// Current token, empty when unset
    pub fn get(&self) -> String {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn clear(&self) {
        self.set(String::new());
    }

    /// Clear the token unless the user replaced it in the meantime
    ///
    /// Returns whether the token was cleared.
    pub fn clear_if_matches(&self, rejected: &str) -> bool {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.trim() == rejected.trim() {
            guard.clear();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.get().trim().is_empty()
    }

    /// Token to put into a lookup request, `None` when unset
    pub fn request_value(&self) -> Option<String> {
        let token = self.get();
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}

/// Settings of one run
///
/// Holds the loaded [`Config`] and the live [`Credential`]. A token given on
/// the command line or in the environment is used for this run only. While
/// such an override is active only explicit edits through
/// [`set_token`](Self::set_token) reach the settings file; without one, a
/// token the service rejected is cleared there as well.
#[derive(Debug)]
pub struct Settings {
    store: ConfigStore,
    pub config: Config,
    credential: Credential,
    initial_token: String,
    override_active: bool,
    token_edited: bool,
}

impl Settings {
    pub fn load(store: ConfigStore, token_override: Option<String>) -> Self {
        let config = store.load();
        let override_active = token_override.is_some();
        let initial_token = match token_override {
            Some(token) => {
                debug!("Using API token override for this run");
                token
            }
            None => config.token.clone(),
        };
        Self {
            store,
            config,
            credential: Credential::new(initial_token.clone()),
            initial_token,
            override_active,
            token_edited: false,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Replace the token on behalf of the user, an empty token clears it
    pub fn set_token(&mut self, token: &str) {
        self.credential.set(token.trim());
        self.token_edited = true;
    }

    /// Remember the camera used for scanning
    pub fn set_last_camera(&mut self, handle: &str) {
        self.config.last_camera = Some(handle.to_string());
    }

    /// Write the settings back
    pub fn save(&mut self) -> AppResult<()> {
        let token = self.credential.get();
        let changed = token != self.initial_token;
        if self.token_edited || (changed && !self.override_active) {
            self.config.token = token.trim().to_string();
            self.initial_token = token;
            self.token_edited = false;
        } else if changed {
            debug!("Override token changed during the run, stored token kept");
        }
        self.store.save(&self.config)
    }
}

/// Mask a token for display
///
/// At most the last four characters stay visible, and never more than half.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    let visible = (chars.len() / 2).min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_clones_share_value() {
        let credential = Credential::new("abc");
        let lookup_side = credential.clone();
        lookup_side.clear();
        assert!(credential.is_empty());
        assert_eq!(credential.request_value(), None);

        credential.set(" secret ");
        assert_eq!(lookup_side.request_value().as_deref(), Some("secret"));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "(not set)");
        assert_eq!(mask_token("a"), "*");
        assert_eq!(mask_token("abc"), "**c");
        assert_eq!(mask_token("abcd"), "**cd");
        assert_eq!(mask_token("abcdefgh"), "****efgh");
        assert_eq!(mask_token("abcdefghijkl"), "********ijkl");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"token":"t"}"#).unwrap();
        assert_eq!(config.token, "t");
        assert_eq!(config.api_base_url, api::DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, timing::LOOKUP_TIMEOUT_SECS);
        assert_eq!(config.last_camera, None);
    }
}
