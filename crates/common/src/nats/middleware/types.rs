use anyhow::{Context, Result};
use async_nats::HeaderMap;
use bytes::Bytes;
use serde::Serialize;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request to publish a message to NATS
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub subject: String,
    pub payload: Bytes,
    pub headers: HeaderMap,
}

impl PublishRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Serialize `body` as JSON and tag the message with its content type
    pub fn json<T: Serialize>(subject: impl Into<String>, body: &T) -> Result<Self> {
        let payload = serde_json::to_vec(body).context("failed to serialize message body")?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
        Ok(Self::new(subject, payload).with_headers(headers))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Response from a publish operation
#[derive(Debug)]
pub struct PublishResponse {
    pub subject: String,
}
