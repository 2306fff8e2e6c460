//! OAuth2 authorization-code and refresh-token grants against Figma

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AccessToken, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RefreshToken, RequestTokenError, Scope, StandardRevocableToken, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::tokens::TokenState;
use super::{
    effective_redirect_uri, is_blank, OAuthCredentials, AUTHORIZE_URL, DEFAULT_SCOPE, TOKEN_URL,
};
use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::{AccessError, Result};

/// Coarse authorization state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No client id/secret
    Unconfigured,
    /// Client registered, no tokens yet (or revoked)
    Configured,
    /// Access token valid beyond the refresh threshold
    Authorized,
    /// Tokens present but the access token needs a refresh
    Expiring,
}

/// Token endpoint reply. `token_type` may be absent and `expires_in` may be
/// zero or negative; both still yield a usable grant.
#[derive(Debug, Deserialize, Serialize)]
pub struct GrantResponse {
    access_token: AccessToken,
    #[serde(default = "bearer", deserialize_with = "token_type_or_bearer")]
    token_type: BasicTokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
}

fn bearer() -> BasicTokenType {
    BasicTokenType::Bearer
}

fn token_type_or_bearer<'de, D>(deserializer: D) -> std::result::Result<BasicTokenType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BasicTokenType>::deserialize(deserializer)?.unwrap_or_else(bearer))
}

impl TokenResponse<BasicTokenType> for GrantResponse {
    fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    fn token_type(&self) -> &BasicTokenType {
        &self.token_type
    }

    /// Non-positive lifetimes read as unknown.
    fn expires_in(&self) -> Option<std::time::Duration> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| std::time::Duration::from_secs(secs as u64))
    }

    fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    fn scopes(&self) -> Option<&Vec<Scope>> {
        None
    }
}

type FigmaOAuthClient = oauth2::Client<
    BasicErrorResponse,
    GrantResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Owns the token state and performs the OAuth grants.
pub struct AuthManager<T> {
    transport: Arc<T>,
    authorize_url: String,
    token_url: String,
    credentials: RwLock<Option<OAuthCredentials>>,
    tokens: RwLock<Arc<TokenState>>,
    /// Serializes refresh grants.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<T: Transport> AuthManager<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            credentials: RwLock::new(None),
            tokens: RwLock::new(Arc::new(TokenState::default())),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the provider endpoints.
    pub fn with_endpoints(mut self, authorize_url: &str, token_url: &str) -> Self {
        self.authorize_url = authorize_url.to_string();
        self.token_url = token_url.to_string();
        self
    }

    /// Replace the client registration used for refresh.
    pub fn configure(&self, credentials: OAuthCredentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    pub fn credentials(&self) -> Option<OAuthCredentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install previously persisted tokens.
    pub fn restore(&self, state: TokenState) {
        self.replace_tokens(Arc::new(state));
    }

    /// Current token snapshot.
    pub fn tokens(&self) -> Arc<TokenState> {
        Arc::clone(&self.tokens.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace_tokens(&self, next: Arc<TokenState>) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn is_configured(&self) -> bool {
        self.credentials()
            .map_or(false, |creds| creds.is_complete())
    }

    pub fn is_authorized(&self) -> bool {
        self.tokens().is_authorized()
    }

    pub fn status(&self) -> AuthStatus {
        let tokens = self.tokens();
        if tokens.access().is_some() && !tokens.is_expiring() {
            AuthStatus::Authorized
        } else if tokens.is_authorized() {
            AuthStatus::Expiring
        } else if self.is_configured() {
            AuthStatus::Configured
        } else {
            AuthStatus::Unconfigured
        }
    }

    /// Drop both tokens and the expiry.
    pub fn revoke(&self) {
        self.replace_tokens(Arc::new(TokenState::default()));
        tracing::debug!("OAuth tokens cleared");
    }

    fn oauth_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<FigmaOAuthClient> {
        let auth_url = AuthUrl::new(self.authorize_url.clone()).map_err(|e| {
            AccessError::configuration(format!("invalid authorization endpoint: {}", e))
        })?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| AccessError::configuration(format!("invalid token endpoint: {}", e)))?;

        Ok(FigmaOAuthClient::new(
            ClientId::new(client_id.to_string()),
            client_secret.map(|s| ClientSecret::new(s.to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }

    /// URL the user visits to grant access. A blank redirect URI falls back
    /// to the default; any other value is passed through as given.
    pub fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: Option<&str>,
        state: &str,
    ) -> Result<Url> {
        if is_blank(client_id) {
            return Err(AccessError::configuration("client ID is required"));
        }

        let client = self.oauth_client(client_id, None)?;
        let state = state.to_string();
        let (url, _) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_extra_param("redirect_uri", effective_redirect_uri(redirect_uri))
            .add_scope(Scope::new(DEFAULT_SCOPE.to_string()))
            .url();
        Ok(url)
    }

    /// Exchange an authorization code for tokens. The token state is only
    /// replaced when the grant succeeds.
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: Option<&str>,
    ) -> Result<Arc<TokenState>> {
        if is_blank(code) {
            return Err(AccessError::configuration("authorization code is required"));
        }
        if is_blank(client_id) {
            return Err(AccessError::configuration("client ID is required"));
        }
        if is_blank(client_secret) {
            return Err(AccessError::configuration("client secret is required"));
        }

        let client = self.oauth_client(client_id, Some(client_secret))?;

        tracing::debug!("Exchanging authorization code for tokens");
        let response = client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .add_extra_param("redirect_uri", effective_redirect_uri(redirect_uri))
            .request_async(|request| self.token_request(request))
            .await
            .map_err(token_error)?;

        Ok(self.store_grant(&response))
    }

    /// Refresh-token grant using the configured client and stored refresh token.
    pub async fn refresh(&self) -> Result<Arc<TokenState>> {
        let creds = self
            .credentials()
            .ok_or_else(|| AccessError::configuration("client ID is not configured"))?;
        if is_blank(&creds.client_id) {
            return Err(AccessError::configuration("client ID is not configured"));
        }
        if is_blank(&creds.client_secret) {
            return Err(AccessError::configuration("client secret is not configured"));
        }
        let refresh_token = self
            .tokens()
            .refresh()
            .map(String::from)
            .ok_or_else(|| AccessError::configuration("no refresh token available"))?;

        let client = self.oauth_client(&creds.client_id, Some(&creds.client_secret))?;

        tracing::debug!("Refreshing access token");
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(|request| self.token_request(request))
            .await
            .map_err(token_error)?;

        Ok(self.store_grant(&response))
    }

    /// Access token for the next request, refreshed first when it is within
    /// the threshold of expiry (or its expiry is unknown).
    ///
    /// Without a refresh token a stale token is returned as is; the resource
    /// server decides.
    pub async fn valid_access_token(&self) -> Result<String> {
        let current = self.tokens();
        let access = current
            .access()
            .ok_or_else(|| {
                AccessError::NotAuthorized("no access token available, authorize first".into())
            })?
            .to_string();

        if !current.is_expiring() {
            return Ok(access);
        }
        if current.refresh().is_none() {
            tracing::warn!("Access token expired but no refresh token available");
            return Ok(access);
        }

        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed while we waited
        let latest = self.tokens();
        if !Arc::ptr_eq(&latest, &current) && !latest.is_expiring() {
            if let Some(token) = latest.access() {
                return Ok(token.to_string());
            }
        }

        tracing::info!("Access token expired or expiring soon, refreshing...");
        let refreshed = self.refresh().await?;
        refreshed
            .access()
            .map(String::from)
            .ok_or_else(|| AccessError::Protocol("token endpoint returned no access token".into()))
    }

    fn store_grant(&self, response: &GrantResponse) -> Arc<TokenState> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(TokenState::from_grant(
            response.access_token().secret().clone(),
            response.refresh_token().map(|t| t.secret().clone()),
            response.expires_in(),
            &tokens,
            Utc::now(),
        ));
        *tokens = Arc::clone(&next);

        match next.expires_at {
            Some(exp) => tracing::debug!("Stored new tokens, expiring at {}", exp),
            None => tracing::debug!("Stored new tokens, expiry unknown"),
        }
        next
    }

    /// Token endpoint call. Non-2xx statuses become `Server` errors so the
    /// provider's status and body reach the caller intact.
    async fn token_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        let status = response.status_code.as_u16();
        tracing::debug!("Token endpoint response status: {}", status);

        if !response.status_code.is_success() {
            return Err(AccessError::Server {
                status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }
}

fn token_error(err: RequestTokenError<AccessError, BasicErrorResponse>) -> AccessError {
    match err {
        RequestTokenError::Request(e) => e,
        RequestTokenError::ServerResponse(resp) => {
            AccessError::Protocol(format!("token endpoint rejected the grant: {}", resp))
        }
        RequestTokenError::Parse(e, _) => {
            AccessError::Protocol(format!("failed to parse token response: {}", e))
        }
        RequestTokenError::Other(msg) => AccessError::Protocol(msg),
    }
}
