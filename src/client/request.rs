//! No-WASM transport implementation using reqwest
//!
//! This module provides HTTP functionality for non-WASM environments
//! using the reqwest crate for making HTTP requests.

use crate::error::{ErrorKind, Result};
use crate::interface::{Delay, Transport};
use crate::model::dtos::{HttpMethod, OutgoingRequest, RawResponse};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method,
};
use std::time::Duration;

/// HTTP transport for no-WASM environments using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn perform_request(&self, request: &OutgoingRequest) -> Result<RawResponse> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| ErrorKind::InvalidRequest(e.to_string()))?,
                HeaderValue::from_str(value)
                    .map_err(|e| ErrorKind::InvalidRequest(e.to_string()))?,
            );
        }

        let mut builder = self
            .client
            .request(to_method(request.method), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Ok(RawResponse { status, body })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Backoff timer on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
