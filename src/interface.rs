#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::model::dtos::{AntiForgeryToken, OutgoingRequest, RawResponse};
use crate::model::structs::UiEvent;
use std::time::Duration;

/// Performs one HTTP exchange. No retries happen at this level.
pub trait Transport {
    /// Send the request and hand back whatever status the server answered with.
    /// Only connection-level failures are errors.
    async fn perform_request(&self, request: &OutgoingRequest) -> Result<RawResponse>;
}

/// Backoff timer
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

/// Durable key-value slot holding the serialized offline queue
pub trait QueueStore {
    /// `None` when nothing has been written yet
    fn read_queue(&self) -> Result<Option<Vec<u8>>>;

    fn write_queue(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Source of the page's anti-forgery header, read once per request
pub trait TokenSource {
    fn anti_forgery_token(&self) -> Option<AntiForgeryToken>;
}

/// No token configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenSource for NoToken {
    fn anti_forgery_token(&self) -> Option<AntiForgeryToken> {
        None
    }
}

/// Fixed token, e.g. handed over on the command line
#[derive(Debug, Clone)]
pub struct StaticToken(pub AntiForgeryToken);

impl TokenSource for StaticToken {
    fn anti_forgery_token(&self) -> Option<AntiForgeryToken> {
        Some(self.0.clone())
    }
}

/// UI surface the core reports to
pub trait EventSink {
    fn emit(&self, event: UiEvent);
}

/// Sink for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn emit(&self, _event: UiEvent) {}
}

impl EventSink for futures::channel::mpsc::UnboundedSender<UiEvent> {
    fn emit(&self, event: UiEvent) {
        // receiver gone means the UI is gone
        let _ = self.unbounded_send(event);
    }
}
