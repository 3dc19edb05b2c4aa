//! WASM transport implementation using gloo_net
//!
//! This module provides HTTP functionality for WASM environments
//! using the gloo_net crate for making HTTP requests via the browser's fetch API.

use crate::error::{ErrorKind, Result};
use crate::interface::{Delay, TokenSource, Transport};
use crate::model::dtos::{AntiForgeryToken, HttpMethod, OutgoingRequest, RawResponse};
use gloo_net::http::{Request, RequestBuilder};
use std::time::Duration;
use web_sys::{RequestCredentials, RequestMode};

/// HTTP transport for WASM environments using gloo_net
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTransport;

impl GlooTransport {
    /// Build a request with common settings
    fn build_request(method: HttpMethod, url: &str) -> RequestBuilder {
        let builder = match method {
            HttpMethod::Get => Request::get(url),
            HttpMethod::Post => Request::post(url),
            HttpMethod::Put => Request::put(url),
            HttpMethod::Patch => Request::patch(url),
            HttpMethod::Delete => Request::delete(url),
        };

        // same-origin page: cookies carry the session
        builder
            .mode(RequestMode::SameOrigin)
            .credentials(RequestCredentials::SameOrigin)
    }
}

impl Transport for GlooTransport {
    async fn perform_request(&self, request: &OutgoingRequest) -> Result<RawResponse> {
        let mut builder = Self::build_request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let resp = match &request.body {
            Some(body) => builder.body(body.clone())?.send().await?,
            None => builder.send().await?,
        };

        let status = resp.status();
        log::debug!("{} {} -> {}", request.method, request.url, status);
        let body = resp.text().await?;

        Ok(RawResponse { status, body })
    }
}

/// Backoff timer on the browser event loop
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooDelay;

impl Delay for GlooDelay {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

/// Reads `<meta name="_csrf">` and `<meta name="_csrf_header">` on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaTagTokenSource;

impl MetaTagTokenSource {
    fn meta_content(name: &str) -> Option<String> {
        let document = web_sys::window()?.document()?;
        let element = document
            .query_selector(&format!("meta[name=\"{name}\"]"))
            .ok()??;
        element
            .get_attribute("content")
            .filter(|content| !content.is_empty())
    }
}

impl TokenSource for MetaTagTokenSource {
    fn anti_forgery_token(&self) -> Option<AntiForgeryToken> {
        let value = Self::meta_content("_csrf")?;
        let header_name = Self::meta_content("_csrf_header")?;
        Some(AntiForgeryToken { header_name, value })
    }
}

/// Browser connectivity as reported by `navigator.onLine`
pub fn browser_is_online() -> Result<bool> {
    web_sys::window()
        .map(|window| window.navigator().on_line())
        .ok_or_else(|| ErrorKind::Environment("no window object".to_string()).into())
}
