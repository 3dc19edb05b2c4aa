use crate::error::{ErrorKind, Result};
use crate::interface::QueueStore;
use web_sys::Storage;

/// Queue persisted in the browser's `localStorage` under a fixed key
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    key: String,
}

impl LocalStorageStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Result<Storage> {
        web_sys::window()
            .ok_or_else(|| ErrorKind::Persistence("no window object".to_string()))?
            .local_storage()
            .map_err(|e| ErrorKind::Persistence(format!("localStorage denied: {e:?}")))?
            .ok_or_else(|| ErrorKind::Persistence("localStorage unavailable".to_string()).into())
    }
}

impl QueueStore for LocalStorageStore {
    fn read_queue(&self) -> Result<Option<Vec<u8>>> {
        let value = Self::storage()?
            .get_item(&self.key)
            .map_err(|e| ErrorKind::Persistence(format!("read {}: {e:?}", self.key)))?;
        Ok(value.map(String::into_bytes))
    }

    fn write_queue(&mut self, bytes: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ErrorKind::Persistence(format!("queue is not utf-8: {e}")))?;

        // QuotaExceededError surfaces here
        Self::storage()?
            .set_item(&self.key, text)
            .map_err(|e| ErrorKind::Persistence(format!("write {}: {e:?}", self.key)).into())
    }
}
