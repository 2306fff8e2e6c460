//! Authenticated HTTP client for the Figma REST API
//!
//! The client knows nothing about authentication modes; callers hand it an
//! [`AuthScheme`] that puts the right header on the request.

use std::sync::Arc;

use oauth2::http::{header, HeaderMap, HeaderValue, Method};
use url::Url;

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::{AccessError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.figma.com/v1";

/// Header used by personal access tokens (`X-FIGMA-TOKEN`).
pub const FIGMA_TOKEN_HEADER: &str = "x-figma-token";

/// How a request carries its credential.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `X-FIGMA-TOKEN: <token>`
    PersonalToken(String),
}

impl AuthScheme {
    fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let (name, value) = match self {
            Self::Bearer(token) => (header::AUTHORIZATION, format!("Bearer {}", token)),
            Self::PersonalToken(token) => (
                header::HeaderName::from_static(FIGMA_TOKEN_HEADER),
                token.clone(),
            ),
        };
        let mut value = HeaderValue::from_str(&value).map_err(|_| {
            AccessError::configuration("token contains characters not allowed in a header")
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);
        Ok(())
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::PersonalToken(_) => f.write_str("PersonalToken(..)"),
        }
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<D: serde::de::DeserializeOwned>(&self) -> Result<D> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AccessError::Protocol(format!("failed to parse response body: {}", e)))
    }
}

/// Request dispatcher for the Figma API.
pub struct FigmaClient<T> {
    transport: Arc<T>,
    base_url: Url,
}

impl<T: Transport> FigmaClient<T> {
    /// A blank base URL selects the public API.
    pub fn new(transport: Arc<T>, base_url: Option<&str>) -> Result<Self> {
        let base = match base_url {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ => DEFAULT_API_BASE,
        };
        let base_url = Url::parse(base)
            .map_err(|e| AccessError::configuration(format!("invalid API base URL {:?}: {}", base, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AccessError::configuration(format!(
                "invalid API base URL {:?}",
                base
            )));
        }
        Ok(Self {
            transport,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended by percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url` with the given credential.
    pub async fn get(&self, url: Url, auth: &AuthScheme) -> Result<ApiResponse> {
        self.dispatch(Method::GET, url, auth, Vec::new(), None).await
    }

    /// POST a JSON body to `url` with the given credential.
    pub async fn post_json(
        &self,
        url: Url,
        auth: &AuthScheme,
        body: &serde_json::Value,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_vec(body)
            .map_err(|e| AccessError::Protocol(format!("failed to encode request body: {}", e)))?;
        self.dispatch(Method::POST, url, auth, body, Some("application/json"))
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        auth: &AuthScheme,
        body: Vec<u8>,
        content_type: Option<&'static str>,
    ) -> Result<ApiResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        auth.apply(&mut headers)?;

        tracing::debug!("Figma {} {}", method, url);
        let location = url.to_string();
        let resp = self
            .transport
            .send(HttpRequest {
                url,
                method,
                headers,
                body,
            })
            .await?;

        check_response(resp, &location)
    }
}

/// Turn a non-2xx response into a `Server` error carrying status and body.
fn check_response(resp: HttpResponse, url: &str) -> Result<ApiResponse> {
    let status = resp.status_code.as_u16();
    if !resp.status_code.is_success() {
        let body = String::from_utf8_lossy(&resp.body).into_owned();
        if status == 401 || status == 403 {
            tracing::warn!("HTTP {} for {}. Token may be invalid or expired.", status, url);
        } else {
            tracing::debug!("HTTP {} for {}", status, url);
        }
        return Err(AccessError::Server { status, body });
    }
    Ok(ApiResponse {
        status,
        body: resp.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::stub::StubTransport;

    fn client(stub: StubTransport) -> (Arc<StubTransport>, FigmaClient<StubTransport>) {
        let stub = Arc::new(stub);
        let client = FigmaClient::new(Arc::clone(&stub), None).unwrap();
        (stub, client)
    }

    #[tokio::test]
    async fn test_bearer_scheme() {
        let (stub, client) = client(StubTransport::new().reply(200, "{}"));
        let url = client.endpoint(&["files", "abc"]);
        client
            .get(url, &AuthScheme::Bearer("tok".into()))
            .await
            .unwrap();

        let request = stub.last();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "https://api.figma.com/v1/files/abc");
        assert_eq!(request.headers[header::AUTHORIZATION], "Bearer tok");
        assert!(request.headers.get(FIGMA_TOKEN_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_personal_token_scheme() {
        let (stub, client) = client(StubTransport::new().reply(200, "{}"));
        let url = client.endpoint(&["files", "abc"]);
        client
            .get(url, &AuthScheme::PersonalToken("figd_123".into()))
            .await
            .unwrap();

        let request = stub.last();
        assert_eq!(request.headers[FIGMA_TOKEN_HEADER], "figd_123");
        assert!(request.headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_non_success_is_server_error() {
        let (stub, client) = client(StubTransport::new().reply(404, r#"{"err":"Not found"}"#));
        let url = client.endpoint(&["files", "missing"]);
        let err = client
            .get(url, &AuthScheme::Bearer("tok".into()))
            .await
            .unwrap_err();

        match err {
            AccessError::Server { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, r#"{"err":"Not found"}"#);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // No retry
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_post_json() {
        let (stub, client) = client(StubTransport::new().reply(201, r#"{"ok":true}"#));
        let url = client.endpoint(&["files", "abc", "comments"]);
        let resp = client
            .post_json(
                url,
                &AuthScheme::Bearer("tok".into()),
                &serde_json::json!({"message": "hi"}),
            )
            .await
            .unwrap();

        assert_eq!(resp.status, 201);
        let request = stub.last();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(request.body, r#"{"message":"hi"}"#);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let (_, client) = client(StubTransport::new());
        let url = client.endpoint(&["files", "a/b c"]);
        assert_eq!(url.as_str(), "https://api.figma.com/v1/files/a%2Fb%20c");
    }

    #[test]
    fn test_base_url_fallback_and_trailing_slash() {
        let stub = Arc::new(StubTransport::new());
        let blank = FigmaClient::new(Arc::clone(&stub), Some("  ")).unwrap();
        assert_eq!(blank.base_url().as_str(), DEFAULT_API_BASE);

        let custom = FigmaClient::new(Arc::clone(&stub), Some("http://localhost:3000/v1/")).unwrap();
        assert_eq!(
            custom.endpoint(&["files", "k"]).as_str(),
            "http://localhost:3000/v1/files/k"
        );

        assert!(FigmaClient::new(stub, Some("not a url")).is_err());
    }

    #[test]
    fn test_header_rejects_control_characters() {
        let mut headers = HeaderMap::new();
        let err = AuthScheme::Bearer("bad\ntoken".into())
            .apply(&mut headers)
            .unwrap_err();
        assert!(matches!(err, AccessError::Configuration(_)));
    }

    #[test]
    fn test_debug_hides_token() {
        let shown = format!("{:?}", AuthScheme::PersonalToken("secret".into()));
        assert!(!shown.contains("secret"));
    }
}
