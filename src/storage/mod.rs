//! Storage module - durable slots for the offline queue
//!
//! A JSON file backs the queue on native targets and `localStorage` backs it
//! in the browser. `MemoryStore` is available everywhere.

use crate::error::{ErrorKind, Result};
use crate::interface::QueueStore;

#[cfg(feature = "no-wasm")]
mod file;
#[cfg(feature = "no-wasm")]
pub use file::FileStore;

#[cfg(feature = "wasm")]
mod local;
#[cfg(feature = "wasm")]
pub use local::LocalStorageStore;

/// Volatile store, lost with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Option<Vec<u8>>,
    /// Simulated quota; writes above it fail
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            bytes: None,
            capacity: Some(capacity),
        }
    }
}

impl QueueStore for MemoryStore {
    fn read_queue(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.bytes.clone())
    }

    fn write_queue(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if bytes.len() > capacity {
                return Err(ErrorKind::Persistence(format!(
                    "quota exceeded: {} bytes > {} bytes",
                    bytes.len(),
                    capacity
                ))
                .into());
            }
        }
        self.bytes = Some(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_starts_empty_and_keeps_last_write() {
        let mut store = MemoryStore::new();
        assert_eq!(store.read_queue().unwrap(), None);

        store.write_queue(b"[1]").unwrap();
        store.write_queue(b"[1,2]").unwrap();
        assert_eq!(store.read_queue().unwrap(), Some(b"[1,2]".to_vec()));
    }

    #[test]
    fn memory_store_reports_quota() {
        let mut store = MemoryStore::with_capacity_limit(4);
        let err = store.write_queue(b"too long").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Persistence(_)));
        assert_eq!(store.read_queue().unwrap(), None);
    }
}
