//! Durable FIFO of writes deferred while offline

use crate::dispatch::RequestDispatcher;
use crate::error::{ErrorKind, Result};
use crate::interface::{Delay, QueueStore, Transport};
use crate::model::dtos::{HttpMethod, RequestOptions};
use crate::model::structs::{FlushReport, QueuedOperation};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Offline queue over a `QueueStore`.
///
/// Every public operation loads the persisted queue, changes it and writes
/// it back while holding the store lock. The lock is never held across an
/// `.await`, so enqueues may interleave with a running flush without losing
/// writes. At most one flush runs at a time.
pub struct OfflineQueue<S> {
    store: Mutex<S>,
    flushing: AtomicBool,
}

impl<S: QueueStore> OfflineQueue<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            flushing: AtomicBool::new(false),
        }
    }

    /// Append an operation and persist the queue. Returns the new id.
    pub fn enqueue(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<String> {
        let operation = QueuedOperation {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            endpoint: endpoint.to_string(),
            payload,
            enqueued_at: Utc::now(),
        };
        let id = operation.id.clone();

        let mut store = self.lock()?;
        let mut operations = load(&*store)?;
        operations.push(operation);
        save(&mut *store, &operations)?;

        log::warn!("queued {method} {endpoint} as {id} ({} pending)", operations.len());
        Ok(id)
    }

    /// Snapshot in FIFO order
    pub fn list(&self) -> Result<Vec<QueuedOperation>> {
        let store = self.lock()?;
        load(&*store)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Replay every queued operation once, oldest first.
    ///
    /// A failed replay leaves its operation queued and moves on to the next
    /// one. Only store failures abort the flush. A flush started while
    /// another one is running returns an empty report.
    pub async fn flush<T: Transport, D: Delay>(
        &self,
        dispatcher: &RequestDispatcher<T, D>,
    ) -> Result<FlushReport> {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            log::debug!("offline queue flush already running, skipping");
            return Ok(FlushReport::default());
        };

        let snapshot = self.list()?;
        let mut report = FlushReport::default();

        for operation in snapshot {
            let result = dispatcher
                .send(
                    operation.method,
                    &operation.endpoint,
                    operation.payload.as_ref(),
                    RequestOptions::single_attempt(),
                )
                .await;

            match result {
                Ok(_) => {
                    self.remove(&operation.id)?;
                    report.succeeded.push(operation.id);
                }
                Err(e) => {
                    log::warn!(
                        "replay of {} {} ({}) failed: {}",
                        operation.method,
                        operation.endpoint,
                        operation.id,
                        e
                    );
                    report.failed.push(operation.id);
                }
            }
        }

        if !report.is_empty() {
            log::info!(
                "offline queue flushed: {} succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn remove(&self, id: &str) -> Result<()> {
        let mut store = self.lock()?;
        let mut operations = load(&*store)?;
        operations.retain(|op| op.id != id);
        save(&mut *store, &operations)
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| ErrorKind::Persistence("queue store lock poisoned".to_string()).into())
    }
}

/// Holds the `flushing` flag, released on drop (also when the flush
/// future is dropped mid-replay).
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn load<S: QueueStore>(store: &S) -> Result<Vec<QueuedOperation>> {
    match store.read_queue()? {
        Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
        _ => Ok(Vec::new()),
    }
}

fn save<S: QueueStore>(store: &mut S, operations: &[QueuedOperation]) -> Result<()> {
    let bytes = serde_json::to_vec(operations)?;
    store.write_queue(&bytes).inspect_err(|e| {
        log::error!("could not persist offline queue: {e}");
    })
}
