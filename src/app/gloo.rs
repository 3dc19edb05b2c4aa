//! WASM application wiring
//!
//! Builds an `EnrollmentContext` for the browser: fetch transport, the
//! page's CSRF meta tags, `localStorage` for the queue and the window's
//! `online`/`offline` events for connectivity.

use super::EnrollmentContext;
use crate::client::gloo::{browser_is_online, GlooDelay, GlooTransport, MetaTagTokenSource};
use crate::config::ClientConfig;
use crate::dispatch::RequestDispatcher;
use crate::error::{ErrorKind, Result};
use crate::interface::EventSink;
use crate::queue::OfflineQueue;
use crate::storage::LocalStorageStore;
use crate::telemetry::{new_session_id, Telemetry};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::Window;

pub type BrowserContext = EnrollmentContext<GlooTransport, GlooDelay, LocalStorageStore>;

/// Build the browser context. Telemetry, when enabled, is delivered on a
/// local task for as long as the context lives.
pub fn build_browser(config: &ClientConfig, events: impl EventSink + 'static) -> Result<BrowserContext> {
    config.validate()?;

    let dispatcher = RequestDispatcher::new(GlooTransport, GlooDelay, config.api_url())
        .with_token_source(MetaTagTokenSource);

    let telemetry = if config.telemetry_enabled {
        let (telemetry, outbox) = Telemetry::channel(new_session_id(), config.analytics_url());
        spawn_local(async move {
            let transport = GlooTransport;
            let delivered = outbox.deliver(&transport).await;
            log::debug!("telemetry outbox closed after {delivered} records");
        });
        telemetry
    } else {
        Telemetry::disabled()
    };

    let context = EnrollmentContext::new(
        dispatcher,
        OfflineQueue::new(LocalStorageStore::new(config.queue_key.clone())),
        telemetry,
        events,
    )
    .with_options(config.request_options())
    .with_queue_on_failure(config.queue_on_failure)
    .with_online(browser_is_online()?);

    if let Some(path) = web_sys::window().and_then(|window| window.location().pathname().ok()) {
        context.track_page_view(&path);
    }

    Ok(context)
}

/// Window listeners forwarding connectivity changes; removed on drop.
pub struct ConnectivityWatch {
    window: Window,
    online: Closure<dyn FnMut()>,
    offline: Closure<dyn FnMut()>,
}

/// Hook `context` up to the window's `online` and `offline` events.
/// Coming back online flushes the offline queue.
pub fn watch_connectivity(context: Rc<BrowserContext>) -> Result<ConnectivityWatch> {
    let window =
        web_sys::window().ok_or_else(|| ErrorKind::Environment("no window object".to_string()))?;

    let online = {
        let context = Rc::clone(&context);
        Closure::<dyn FnMut()>::new(move || {
            let context = Rc::clone(&context);
            spawn_local(async move {
                if let Err(e) = context.on_online().await {
                    log::error!("flushing offline queue failed: {e}");
                }
            });
        })
    };
    let offline = Closure::<dyn FnMut()>::new(move || context.on_offline());

    for (event, callback) in [("online", &online), ("offline", &offline)] {
        window
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|e| ErrorKind::Environment(format!("listen for {event}: {e:?}")))?;
    }

    Ok(ConnectivityWatch {
        window,
        online,
        offline,
    })
}

impl Drop for ConnectivityWatch {
    fn drop(&mut self) {
        for (event, callback) in [("online", &self.online), ("offline", &self.offline)] {
            let _ = self
                .window
                .remove_event_listener_with_callback(event, callback.as_ref().unchecked_ref());
        }
    }
}
