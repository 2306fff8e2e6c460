//! Authentication for the Figma API
//!
//! Implements the OAuth2 authorization-code flow (with refresh) and the
//! static personal access token alternative.

pub mod manager;
pub mod oauth;
pub mod tokens;

use serde::{Deserialize, Serialize};

pub use manager::{AuthManager, AuthStatus};
pub use oauth::{authorize, login, logout, status};
pub use tokens::TokenState;

/// Browser-facing authorization endpoint
pub const AUTHORIZE_URL: &str = "https://www.figma.com/oauth";
/// Token endpoint for code exchange and refresh
pub const TOKEN_URL: &str = "https://www.figma.com/api/oauth/token";
/// Read-only access to files
pub const DEFAULT_SCOPE: &str = "file_read";
/// Redirect URI used when none is configured
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";

/// Which header scheme authenticates resource requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// OAuth2 bearer token
    #[default]
    #[value(name = "oauth")]
    OAuth,
    /// Personal access token in `X-FIGMA-TOKEN`
    Token,
}

/// OAuth client registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

impl OAuthCredentials {
    /// Configured redirect URI, or the default when blank.
    pub fn effective_redirect_uri(&self) -> &str {
        effective_redirect_uri(self.redirect_uri.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

/// Credential set for one authentication mode. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    OAuth(OAuthCredentials),
    StaticToken(String),
}

impl Credentials {
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::OAuth(_) => AuthMode::OAuth,
            Self::StaticToken(_) => AuthMode::Token,
        }
    }
}

pub(crate) fn effective_redirect_uri(redirect_uri: Option<&str>) -> &str {
    match redirect_uri {
        Some(uri) if !uri.trim().is_empty() => uri,
        _ => DEFAULT_REDIRECT_URI,
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
