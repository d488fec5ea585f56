use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::STORAGE_KEY;

/// Persistence boundary for the history ledger. The ledger never touches the
/// filesystem directly; it hands a serialized payload across this seam and
/// reads one back at startup.
pub trait HistoryStore {
    /// Returns the persisted payload, or `None` if nothing was ever saved.
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, payload: &str) -> Result<()>;
}

/// File-backed store keeping the ledger as JSON under the fixed storage key.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(format!("{}.json", STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(content))
    }

    fn write(&self, payload: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, payload)?;
        info!("Saved history to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());

        store.write(r#"[{"fake":"payload"}]"#).unwrap();
        assert_eq!(
            store.read().unwrap().as_deref(),
            Some(r#"[{"fake":"payload"}]"#)
        );
    }

    #[test]
    fn write_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileHistoryStore::new(&nested);

        store.write("[]").unwrap();
        assert!(store.path().exists());
    }
}
