//! Client plumbing shared by the report pipeline.
//!
//! [`IqClient`] wraps a [`Transport`] with cancellation, status checking and
//! JSON decoding. The directory module holds the application, organization
//! and component-detail lookups the pipeline depends on.

pub mod cancel;
pub mod directory;
#[cfg(test)]
pub mod fake;
pub mod transport;

pub use cancel::Cancel;
pub use transport::{HttpSettings, HttpTransport, Response, Transport};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IqError, Result};

/// Cheaply clonable handle to the policy server.
#[derive(Clone)]
pub struct IqClient {
    transport: Arc<dyn Transport>,
}

impl IqClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// GET `path` and decode the body as `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &Cancel,
        path: &str,
        what: &'static str,
    ) -> Result<T> {
        debug!("GET {}", path);
        let response = guard(cancel, self.transport.get(path)).await?;
        decode(path, what, response)
    }

    /// POST `body` as JSON to `path` and decode the reply as `T`.
    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        cancel: &Cancel,
        path: &str,
        body: &B,
        what: &'static str,
    ) -> Result<T> {
        debug!("POST {}", path);
        let payload = serde_json::to_vec(body).map_err(|source| IqError::DecodeFailed {
            what: "request body",
            path: path.to_string(),
            source,
        })?;
        let response = guard(cancel, self.transport.post(path, payload)).await?;
        decode(path, what, response)
    }

    /// PUT `body` as JSON to `path`, returning the raw reply.
    pub async fn put_json<B: Serialize + Sync>(
        &self,
        cancel: &Cancel,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        debug!("PUT {}", path);
        let payload = serde_json::to_vec(body).map_err(|source| IqError::DecodeFailed {
            what: "request body",
            path: path.to_string(),
            source,
        })?;
        let response = guard(cancel, self.transport.put(path, payload)).await?;
        ensure_success(path, response)
    }

    /// DELETE `path`; 2xx statuses are success.
    pub async fn delete(&self, cancel: &Cancel, path: &str) -> Result<()> {
        debug!("DELETE {}", path);
        let status = guard(cancel, self.transport.delete(path)).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(IqError::request_failed(path, Some(status), "delete rejected"))
        }
    }
}

/// Races `call` against the cancellation handle; losing drops the in-flight call.
async fn guard<T>(cancel: &Cancel, call: impl Future<Output = Result<T>>) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(IqError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IqError::Cancelled),
        result = call => result,
    }
}

fn ensure_success(path: &str, response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }
    let reason = String::from_utf8_lossy(&response.body).trim().to_string();
    Err(IqError::request_failed(
        path,
        Some(response.status),
        if reason.is_empty() {
            "non-success status".to_string()
        } else {
            reason
        },
    ))
}

fn decode<T: DeserializeOwned>(path: &str, what: &'static str, response: Response) -> Result<T> {
    let response = ensure_success(path, response)?;
    serde_json::from_slice(&response.body).map_err(|source| IqError::DecodeFailed {
        what,
        path: path.to_string(),
        source,
    })
}
