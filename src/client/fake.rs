use super::transport::{Response, Transport};
use crate::error::{IqError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory transport serving canned responses by path.
///
/// Unknown paths answer 404. Paths registered with [`FakeTransport::fail`]
/// produce a transport error instead of a status.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Response>>,
    broken: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<(String, serde_json::Value)>>,
    calls: std::sync::Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    slow: Mutex<HashMap<String, Duration>>,
}

impl FakeTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn respond(&self, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .await
            .insert(path.to_string(), Response::new(status, body));
    }

    pub async fn respond_json(&self, path: &str, body: serde_json::Value) {
        self.respond(path, 200, &body.to_string()).await;
    }

    /// Delay answers for `path` only; overrides the transport-wide delay.
    pub async fn slow_down(&self, path: &str, delay: Duration) {
        self.slow.lock().await.insert(path.to_string(), delay);
    }

    pub async fn fail(&self, path: &str) {
        self.broken.lock().await.push(path.to_string());
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    async fn answer(&self, path: &str) -> Result<Response> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(path.to_string()).or_insert(0) += 1;
        }
        let delay = self.slow.lock().await.get(path).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken.lock().await.iter().any(|p| p == path) {
            return Err(IqError::request_failed(path, None, "connection reset"));
        }
        Ok(self
            .responses
            .lock()
            .await
            .get(path)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<Response> {
        self.answer(path).await
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Response> {
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        self.posted.lock().await.push((path.to_string(), value));
        self.answer(path).await
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<Response> {
        self.post(path, body).await
    }

    async fn delete(&self, path: &str) -> Result<u16> {
        Ok(self.answer(path).await?.status)
    }
}
