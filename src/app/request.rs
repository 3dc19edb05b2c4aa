//! No-WASM application wiring
//!
//! Builds an `EnrollmentContext` backed by reqwest, tokio timers and a
//! JSON queue file on disk.

use super::EnrollmentContext;
use crate::client::request::{ReqwestTransport, TokioDelay};
use crate::config::ClientConfig;
use crate::dispatch::RequestDispatcher;
use crate::error::Result;
use crate::interface::{EventSink, StaticToken};
use crate::model::dtos::AntiForgeryToken;
use crate::queue::OfflineQueue;
use crate::storage::FileStore;
use crate::telemetry::{new_session_id, Telemetry, TelemetryOutbox};

pub type NativeContext = EnrollmentContext<ReqwestTransport, TokioDelay, FileStore>;

/// Build the native context from `config`.
///
/// The outbox is `None` when telemetry is disabled; otherwise the caller
/// drives `TelemetryOutbox::deliver` next to its work.
pub fn build_native(
    config: &ClientConfig,
    events: impl EventSink + 'static,
    token: Option<AntiForgeryToken>,
) -> Result<(NativeContext, Option<TelemetryOutbox>)> {
    config.validate()?;

    let transport = ReqwestTransport::new(config.request_timeout())?;
    let mut dispatcher = RequestDispatcher::new(transport, TokioDelay, config.api_url());
    if let Some(token) = token {
        dispatcher = dispatcher.with_token_source(StaticToken(token));
    }

    let store = FileStore::new(config.queue_dir_or_default(), &config.queue_key);
    log::debug!("offline queue at {}", store.path().display());

    let (telemetry, outbox) = if config.telemetry_enabled {
        let (telemetry, outbox) = Telemetry::channel(new_session_id(), config.analytics_url());
        (telemetry, Some(outbox))
    } else {
        (Telemetry::disabled(), None)
    };

    let context = EnrollmentContext::new(dispatcher, OfflineQueue::new(store), telemetry, events)
        .with_options(config.request_options())
        .with_queue_on_failure(config.queue_on_failure);

    Ok((context, outbox))
}
