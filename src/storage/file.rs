use crate::error::{ErrorKind, Result};
use crate::interface::QueueStore;
use std::path::{Path, PathBuf};

/// Queue persisted as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStore for FileStore {
    fn read_queue(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence(&self.path, e)),
        }
    }

    fn write_queue(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persistence(parent, e))?;
        }

        // replace atomically
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| persistence(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| persistence(&self.path, e))?;
        Ok(())
    }
}

fn persistence(path: &Path, e: std::io::Error) -> crate::error::Error {
    ErrorKind::Persistence(format!("{}: {e}", path.display())).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), "enrollmentOfflineData");

        assert_eq!(store.read_queue().unwrap(), None);
        assert!(store.path().ends_with("enrollmentOfflineData.json"));
    }

    #[test]
    fn write_creates_directory_and_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("nested").join("queue");

        let mut store = FileStore::new(&dir, "q");
        store.write_queue(br#"[{"id":"a"}]"#).unwrap();

        let reopened = FileStore::new(&dir, "q");
        assert_eq!(
            reopened.read_queue().unwrap(),
            Some(br#"[{"id":"a"}]"#.to_vec())
        );
        assert!(!dir.join("q.json.tmp").exists());
    }

    #[test]
    fn unwritable_location_is_a_persistence_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let mut store = FileStore::new(&blocker, "q");
        let err = store.write_queue(b"[]").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Persistence(_)));
    }
}
