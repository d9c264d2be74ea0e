//! HTTP transport for the redemption call.
//!
//! Kept behind a trait so the gateway can be driven by a fake in tests and by
//! `reqwest` in production.

use async_trait::async_trait;
use checkin_protocol::RedeemRequest;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::TransportError;

/// Whatever the backend answered, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as JSON, or `None` when it is empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

#[async_trait]
pub trait RedeemTransport: Send + Sync {
    /// POSTs `body` as JSON. `authorization` is the full header value.
    ///
    /// Returns `Err` only when no response was received.
    async fn post_json(
        &self,
        url: &str,
        body: &RedeemRequest,
        authorization: Option<&str>,
    ) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RedeemTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &RedeemRequest,
        authorization: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        let url = reqwest::Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.to_string(),
            details: err.to_string(),
        })?;

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Body(err.to_string()))?;

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}
