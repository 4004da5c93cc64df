//! HTTP transport seam.
//!
//! The report pipeline only builds relative endpoint paths; a [`Transport`]
//! owns the base URL, authentication and the wire. [`HttpTransport`] is the
//! `reqwest` implementation used by the binary.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{IqError, Result};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues requests against relative endpoint paths.
///
/// Implementations return `Ok` for every exchange that produced a status,
/// including error statuses; `Err` is reserved for transport failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Response>;

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Response>;

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<Response>;

    async fn delete(&self, path: &str) -> Result<u16>;
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
}

/// `reqwest`-backed transport with basic authentication.
pub struct HttpTransport {
    settings: HttpSettings,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| IqError::request_failed(&settings.base_url, None, e.to_string()))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, path: &str, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("timed out after {}s", self.settings.timeout_seconds)
                } else if e.is_connect() {
                    format!("cannot connect to {}", self.settings.base_url)
                } else {
                    e.to_string()
                };
                IqError::request_failed(path, None, reason)
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| IqError::request_failed(path, Some(status), e.to_string()))?;

        debug!("{} -> {} ({} bytes)", path, status, body.len());
        Ok(Response::new(status, body.to_vec()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Response> {
        self.send(path, self.http_client.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Response> {
        let request = self
            .http_client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(path, request).await
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<Response> {
        let request = self
            .http_client
            .put(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(path, request).await
    }

    async fn delete(&self, path: &str) -> Result<u16> {
        let response = self
            .send(path, self.http_client.delete(self.url(path)))
            .await?;
        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slashes() {
        let transport = HttpTransport::new(HttpSettings {
            base_url: "http://localhost:8070/".to_string(),
            username: "admin".to_string(),
            password: "admin123".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();

        assert_eq!(
            transport.url("/api/v2/reports/applications"),
            "http://localhost:8070/api/v2/reports/applications"
        );
        assert_eq!(
            transport.url("api/v2/organizations"),
            "http://localhost:8070/api/v2/organizations"
        );
    }

    #[test]
    fn test_unreachable_server_is_request_failure() {
        let transport = HttpTransport::new(HttpSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            username: "admin".to_string(),
            password: "admin123".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();

        let err = tokio_test::block_on(transport.get("api/v2/organizations")).unwrap_err();
        match err {
            IqError::RequestFailed { path, status, .. } => {
                assert_eq!(path, "api/v2/organizations");
                assert_eq!(status, None);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_response_success_range() {
        assert!(Response::new(204, Vec::new()).is_success());
        assert!(!Response::new(404, "missing").is_success());
        assert!(!Response::new(302, Vec::new()).is_success());
    }
}
