//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::{AuthMode, Credentials, OAuthCredentials, TokenState};
use crate::cache::DocumentCache;

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which credential authenticates API requests
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// OAuth redirect URI (default used when unset)
    pub redirect_uri: Option<String>,
    /// Personal access token for token mode
    pub personal_token: Option<String>,
    /// Override for the REST API base URL
    pub api_base_url: Option<String>,
    /// Override for the document cache directory
    pub cache_dir: Option<PathBuf>,
    /// State issued with the last authorization URL, checked at login
    pub oauth_state: Option<String>,
    /// OAuth tokens from the last grant
    #[serde(default)]
    pub tokens: TokenState,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "figma-fetch", "figma-fetch")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn oauth_credentials(&self) -> OAuthCredentials {
        OAuthCredentials {
            client_id: self.client_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone().unwrap_or_default(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }

    /// Credential set for the configured mode.
    pub fn credentials(&self) -> Credentials {
        match self.auth_mode {
            AuthMode::OAuth => Credentials::OAuth(self.oauth_credentials()),
            AuthMode::Token => {
                Credentials::StaticToken(self.personal_token.clone().unwrap_or_default())
            }
        }
    }

    pub fn cache(&self) -> DocumentCache {
        let root = self
            .cache_dir
            .clone()
            .or_else(DocumentCache::default_dir)
            .unwrap_or_else(|| PathBuf::from(".figma-fetch-cache"));
        DocumentCache::new(root)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.auth_mode, AuthMode::OAuth);
        assert!(!config.tokens.is_authorized());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            auth_mode: AuthMode::Token,
            client_id: Some("client".into()),
            personal_token: Some("figd_abc".into()),
            cache_dir: Some(dir.path().join("cache")),
            tokens: TokenState {
                access_token: Some("access".into()),
                refresh_token: Some("refresh".into()),
                expires_at: Some(Utc.with_ymd_and_hms(2026, 1, 18, 0, 0, 0).unwrap()),
            },
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.auth_mode, AuthMode::Token);
        assert_eq!(loaded.client_id.as_deref(), Some("client"));
        assert_eq!(loaded.tokens, config.tokens);
        assert_eq!(loaded.cache().root(), dir.path().join("cache"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_mode_parses_lowercase() {
        let config: Config = toml::from_str("auth_mode = \"token\"\npersonal_token = \"t\"\n").unwrap();
        assert_eq!(config.credentials(), Credentials::StaticToken("t".into()));
    }

    #[test]
    fn test_credentials_follow_mode() {
        let mut config = Config {
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            personal_token: Some("figd".into()),
            ..Default::default()
        };
        match config.credentials() {
            Credentials::OAuth(creds) => {
                assert_eq!(creds.client_id, "client");
                assert_eq!(creds.effective_redirect_uri(), crate::auth::DEFAULT_REDIRECT_URI);
            }
            other => panic!("unexpected credentials: {:?}", other),
        }

        config.auth_mode = AuthMode::Token;
        assert_eq!(config.credentials().mode(), AuthMode::Token);
    }
}
