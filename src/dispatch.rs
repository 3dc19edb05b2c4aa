//! Request dispatch with a fixed retry budget and linear backoff

use crate::error::{is_client_rejection, Error, ErrorKind, Result};
use crate::interface::{Delay, NoToken, TokenSource, Transport};
use crate::model::dtos::{HttpMethod, OutgoingRequest, RawResponse, RequestOptions};
use serde_json::Value;
use std::time::Duration;

/// Sends one logical request, retrying transient failures.
///
/// Holds no per-call state; every `send` is independent.
pub struct RequestDispatcher<T, D> {
    transport: T,
    delay: D,
    base_url: String,
    tokens: Box<dyn TokenSource + Send + Sync>,
}

impl<T: Transport, D: Delay> RequestDispatcher<T, D> {
    pub fn new(transport: T, delay: D, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            delay,
            base_url: base_url.into(),
            tokens: Box::new(NoToken),
        }
    }

    pub fn with_token_source(mut self, tokens: impl TokenSource + Send + Sync + 'static) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Perform `method endpoint` with up to `options.max_attempts` attempts.
    ///
    /// Attempt *k* that fails is followed by a pause of `base_delay * k`.
    /// Transport failures, 5xx/408/429 statuses and undecodable success
    /// bodies are retried; other 4xx statuses end the call at once unless
    /// `options.retry_client_errors` is set. Running out of attempts yields
    /// `ErrorKind::Exhausted` carrying the last failure.
    pub async fn send(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let request = self.build_request(method, endpoint, payload)?;
        let max_attempts = options.max_attempts.max(1);
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max_attempts {
            log::debug!(
                "{} {} attempt {}/{}",
                request.method,
                request.url,
                attempt,
                max_attempts
            );

            let error = match self.transport.perform_request(&request).await {
                Ok(resp) if resp.is_success() => match decode_body(&resp) {
                    Ok(value) => return Ok(value),
                    Err(e) => e,
                },
                Ok(resp) => {
                    if is_client_rejection(resp.status) && !options.retry_client_errors {
                        log::warn!("{} {} rejected with {}", request.method, request.url, resp.status);
                        return Err(ErrorKind::Http { status: resp.status }.into());
                    }
                    ErrorKind::Http { status: resp.status }.into()
                }
                Err(e) => e,
            };

            log::warn!(
                "{} {} attempt {}/{} failed: {}",
                request.method,
                request.url,
                attempt,
                max_attempts,
                error
            );
            last_error = Some(error);

            if attempt < max_attempts {
                let backoff = options
                    .base_delay
                    .checked_mul(attempt)
                    .unwrap_or(Duration::MAX);
                self.delay.sleep(backoff).await;
            }
        }

        let last_cause = last_error
            .unwrap_or_else(|| ErrorKind::Transport("no attempt was made".to_string()).into());
        Err(ErrorKind::Exhausted {
            attempts: max_attempts,
            last_cause,
        }
        .into())
    }

    fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<OutgoingRequest> {
        if endpoint.trim().is_empty() {
            return Err(ErrorKind::InvalidRequest("endpoint must not be empty".to_string()).into());
        }

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        if let Some(token) = self.tokens.anti_forgery_token() {
            headers.push((token.header_name, token.value));
        }

        let body = payload.map(serde_json::to_string).transpose()?;

        Ok(OutgoingRequest {
            method,
            url: join_url(&self.base_url, endpoint),
            headers,
            body,
        })
    }
}

fn decode_body(resp: &RawResponse) -> Result<Value> {
    if resp.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&resp.body).map_err(|e| {
        ErrorKind::Decode(format!("status {} with invalid JSON body: {e}", resp.status)).into()
    })
}

/// `base` + `endpoint` with exactly one slash between them; absolute
/// endpoints are taken as they are.
pub fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
