//! Application module - the enrollment controller
//!
//! `EnrollmentContext` is built once at startup and handed to whatever
//! needs it. It owns the dispatcher, the offline queue, the telemetry
//! handle and the UI event sink, with platform-specific constructors for
//! WASM and no-WASM environments.

mod enrollment;

pub use enrollment::CAPACITY_POLL_INTERVAL;

// Platform-specific modules
#[cfg(feature = "no-wasm")]
pub mod request;
#[cfg(feature = "no-wasm")]
pub use request::*;

#[cfg(feature = "wasm")]
pub mod gloo;
#[cfg(feature = "wasm")]
pub use gloo::*;

use crate::dispatch::RequestDispatcher;
use crate::error::{Error, Result};
use crate::interface::{Delay, EventSink, QueueStore, Transport};
use crate::model::dtos::{HttpMethod, RequestOptions};
use crate::model::structs::{Connectivity, FlushReport, NoticeLevel, UiEvent, WriteOutcome};
use crate::queue::OfflineQueue;
use crate::telemetry::Telemetry;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

const NETWORK_ERROR: &str = "Network error. Please check your connection and try again.";
const SESSION_EXPIRED: &str = "Session expired. Please log in again.";
const FORBIDDEN: &str = "You don't have permission to perform this action.";
const GENERIC_ERROR: &str = "An error occurred. Please try again.";
const SAVED_OFFLINE: &str = "Saved offline. It will be sent when the connection returns.";

pub struct EnrollmentContext<T, D, S> {
    dispatcher: RequestDispatcher<T, D>,
    queue: OfflineQueue<S>,
    telemetry: Telemetry,
    events: Box<dyn EventSink>,
    options: RequestOptions,
    queue_on_failure: bool,
    online: AtomicBool,
    page_view_tracked: AtomicBool,
}

impl<T: Transport, D: Delay, S: QueueStore> EnrollmentContext<T, D, S> {
    pub fn new(
        dispatcher: RequestDispatcher<T, D>,
        queue: OfflineQueue<S>,
        telemetry: Telemetry,
        events: impl EventSink + 'static,
    ) -> Self {
        Self {
            dispatcher,
            queue,
            telemetry,
            events: Box::new(events),
            options: RequestOptions::default(),
            queue_on_failure: true,
            online: AtomicBool::new(true),
            page_view_tracked: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Park writes that fail transiently instead of surfacing the error
    pub fn with_queue_on_failure(mut self, enabled: bool) -> Self {
        self.queue_on_failure = enabled;
        self
    }

    /// Initial connectivity, without emitting events
    pub fn with_online(self, online: bool) -> Self {
        self.online.store(online, Ordering::SeqCst);
        self
    }

    pub fn dispatcher(&self) -> &RequestDispatcher<T, D> {
        &self.dispatcher
    }

    pub fn queue(&self) -> &OfflineQueue<S> {
        &self.queue
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn options(&self) -> RequestOptions {
        self.options
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Connectivity came back: replay the offline queue.
    pub async fn on_online(&self) -> Result<FlushReport> {
        self.online.store(true, Ordering::SeqCst);
        log::info!("connection restored");
        self.emit(UiEvent::Connectivity(Connectivity::Online));
        self.notify(NoticeLevel::Success, "Connection restored");

        let report = self.queue.flush(&self.dispatcher).await?;
        self.emit(UiEvent::FlushFinished(report.clone()));
        Ok(report)
    }

    pub fn on_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
        log::info!("connection lost");
        self.emit(UiEvent::Connectivity(Connectivity::Offline));
        self.notify(
            NoticeLevel::Warning,
            "You are offline. Data will be saved locally.",
        );
    }

    /// Dispatch with the context's retry options
    pub async fn send(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Value> {
        self.dispatcher
            .send(method, endpoint, payload, self.options)
            .await
    }

    /// Dispatch a write, parking it in the offline queue when the network
    /// is known to be down or the dispatch gave up on a transient failure.
    pub async fn send_or_queue(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<WriteOutcome> {
        if self.queue_on_failure && !self.is_online() {
            return self.park(method, endpoint, payload);
        }

        match self.send(method, endpoint, payload.as_ref()).await {
            Ok(value) => Ok(WriteOutcome::Completed(value)),
            Err(e) if self.queue_on_failure && e.is_queueable() => {
                log::warn!("{method} {endpoint} failed ({e}), keeping it for later");
                self.park(method, endpoint, payload)
            }
            Err(e) => Err(e),
        }
    }

    fn park(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<WriteOutcome> {
        let id = self.queue.enqueue(method, endpoint, payload)?;
        self.emit(UiEvent::OperationQueued { id: id.clone() });
        self.notify(NoticeLevel::Warning, SAVED_OFFLINE);
        Ok(WriteOutcome::Queued { id })
    }

    /// Track the `page_view` for `path`. Only the first call per context
    /// records anything; returns whether this call did.
    pub fn track_page_view(&self, path: &str) -> bool {
        if self.page_view_tracked.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.telemetry.track_event("page_view", json!({"page": path}));
        true
    }

    /// Tell the user what went wrong and record it.
    pub fn report_failure(&self, context: &str, error: &Error) {
        log::error!("{context}: {error}");

        let message = if error.is_network() {
            NETWORK_ERROR
        } else {
            match error.status() {
                Some(401) => {
                    self.emit(UiEvent::SessionExpired);
                    SESSION_EXPIRED
                }
                Some(403) => FORBIDDEN,
                _ => GENERIC_ERROR,
            }
        };

        self.notify(NoticeLevel::Error, message);
        self.telemetry.track_error(context, error);
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        self.events.emit(event);
    }

    pub(crate) fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(UiEvent::notice(level, message));
    }
}
