//! HTTP transport seam
//!
//! Every request (token grants and resource calls) goes through a
//! [`Transport`]. Production uses reqwest; tests plug in a stub.

use std::time::Duration;

use async_trait::async_trait;
pub use oauth2::{HttpRequest, HttpResponse};

use crate::error::{AccessError, Result};

/// Connect and whole-request timeout. No request is retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one request and returns the raw response, whatever its status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport with fixed timeouts and redirects disabled.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AccessError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.to_string();
        tracing::debug!("{} {}", request.method, url);

        let resp = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;

        let status_code = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| network_error(&url, e))?
            .to_vec();

        tracing::debug!("{} -> HTTP {}", url, status_code.as_u16());
        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

fn network_error(url: &str, err: reqwest::Error) -> AccessError {
    if err.is_timeout() {
        AccessError::Network(format!(
            "request to {} timed out after {}s",
            url,
            REQUEST_TIMEOUT.as_secs()
        ))
    } else {
        AccessError::Network(format!("request to {} failed: {}", url, err))
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Call-counting stub transport for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use oauth2::http::{HeaderMap, Method, StatusCode};

    use super::*;

    /// A request as seen by the stub.
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub url: String,
        pub headers: HeaderMap,
        pub body: String,
    }

    /// A queued response, or a transport failure message.
    type Reply = std::result::Result<(u16, String), String>;

    /// Replies with queued responses in order; once only one remains it is
    /// reused for every further call.
    #[derive(Default)]
    pub struct StubTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, status: u16, body: impl Into<String>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Ok((status, body.into())));
            self
        }

        /// Queue a `Network` failure.
        pub fn fail(self, message: impl Into<String>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(message.into()));
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        pub fn last(&self) -> Recorded {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(Recorded {
                method: request.method.clone(),
                url: request.url.to_string(),
                headers: request.headers.clone(),
                body: String::from_utf8_lossy(&request.body).into_owned(),
            });

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                let next = if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                };
                next
            };
            let (status, body) = reply
                .ok_or_else(|| AccessError::Network("stub has no reply queued".into()))?
                .map_err(AccessError::Network)?;

            Ok(HttpResponse {
                status_code: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: body.into_bytes(),
            })
        }
    }
}
