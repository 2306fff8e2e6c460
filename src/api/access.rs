//! Cache-first access to Figma files
//!
//! Composes the auth manager, the request dispatcher and the document cache
//! into the operations the rest of the application uses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use super::client::{AuthScheme, FigmaClient};
use super::transport::Transport;
use crate::auth::{is_blank, AuthManager, Credentials, OAuthCredentials};
use crate::cache::{sanitize_key, DocumentCache};
use crate::error::{AccessError, Result};
use crate::models::FigmaFile;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Entry point for fetching documents.
pub struct FigmaAccess<T> {
    auth: AuthManager<T>,
    client: FigmaClient<T>,
    cache: DocumentCache,
    /// One gate per cache key with a fetch in progress.
    in_flight: Mutex<HashMap<String, Gate>>,
}

impl<T: Transport> FigmaAccess<T> {
    pub fn new(transport: Arc<T>, base_url: Option<&str>, cache: DocumentCache) -> Result<Self> {
        Ok(Self {
            auth: AuthManager::new(Arc::clone(&transport)),
            client: FigmaClient::new(transport, base_url)?,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn auth(&self) -> &AuthManager<T> {
        &self.auth
    }

    pub fn client(&self) -> &FigmaClient<T> {
        &self.client
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Authorization URL for the given client registration.
    pub fn authorization_url(&self, credentials: &OAuthCredentials, state: &str) -> Result<Url> {
        self.auth.authorization_url(
            &credentials.client_id,
            credentials.redirect_uri.as_deref(),
            state,
        )
    }

    /// Cached copy of `file_key` if there is one, otherwise fetch it from the
    /// API and cache it. A cache hit never touches the network, however old
    /// the entry is; call [`invalidate`](Self::invalidate) first to force a
    /// fresh copy.
    pub async fn fetch_document(
        &self,
        file_key: &str,
        credentials: &Credentials,
    ) -> Result<FigmaFile> {
        if is_blank(file_key) {
            return Err(AccessError::configuration("file key is required"));
        }
        if let Some(document) = self.cache.load(file_key) {
            return Ok(document);
        }

        let gate = self.gate(file_key);
        let held = gate.lock().await;

        // Filled by a concurrent fetch while we waited
        let result = match self.cache.load(file_key) {
            Some(document) => Ok(document),
            None => self.fetch_and_store(file_key, credentials).await,
        };

        drop(held);
        self.release(file_key, &gate);
        result
    }

    async fn fetch_and_store(&self, file_key: &str, credentials: &Credentials) -> Result<FigmaFile> {
        let auth = self.auth_scheme(credentials).await?;
        let url = self.client.endpoint(&["files", file_key]);

        tracing::info!("Fetching Figma file {}", file_key);
        let response = self.client.get(url, &auth).await?;
        let document: FigmaFile = response.json()?;

        self.cache.save(file_key, &document);
        Ok(document)
    }

    /// Raw JSON for selected nodes of a file. Never cached.
    pub async fn fetch_nodes(
        &self,
        file_key: &str,
        node_ids: &[String],
        credentials: &Credentials,
    ) -> Result<serde_json::Value> {
        if is_blank(file_key) {
            return Err(AccessError::configuration("file key is required"));
        }
        let ids: Vec<&str> = node_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(AccessError::configuration("at least one node id is required"));
        }

        let auth = self.auth_scheme(credentials).await?;
        let mut url = self.client.endpoint(&["files", file_key, "nodes"]);
        url.query_pairs_mut().append_pair("ids", &ids.join(","));

        tracing::info!("Fetching {} node(s) from Figma file {}", ids.len(), file_key);
        self.client.get(url, &auth).await?.json()
    }

    /// Forget the cached copy of `file_key`.
    pub fn invalidate(&self, file_key: &str) {
        self.cache.invalidate(file_key);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn auth_scheme(&self, credentials: &Credentials) -> Result<AuthScheme> {
        match credentials {
            Credentials::OAuth(oauth) => {
                if self.auth.credentials().as_ref() != Some(oauth) {
                    self.auth.configure(oauth.clone());
                }
                Ok(AuthScheme::Bearer(self.auth.valid_access_token().await?))
            }
            Credentials::StaticToken(token) => {
                if is_blank(token) {
                    return Err(AccessError::configuration(
                        "personal access token is required",
                    ));
                }
                Ok(AuthScheme::PersonalToken(token.trim().to_string()))
            }
        }
    }

    fn gate(&self, file_key: &str) -> Gate {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(sanitize_key(file_key)).or_default())
    }

    fn release(&self, file_key: &str, gate: &Gate) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Nobody else waiting: only the map and this caller hold the gate
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(&sanitize_key(file_key));
        }
    }
}
