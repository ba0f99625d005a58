use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{trace, warn};

use crate::domain::TdeError;

// Logical keys of the two persisted snapshots.
pub const ROWS_KEY: &str = "rows";
pub const COLUMNS_KEY: &str = "columns";

// Key-value string store the RowStore and ColumnRegistry write their
// JSON snapshots through. A missing or unreadable key answers None and
// the stores fall back to their built-in defaults.
pub trait Persistence {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), TdeError>;
}

// One file per key inside the data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TdeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Persistence for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Some(content),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Reading {:?} failed: {}", self.path_for(key), e);
                }
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), TdeError> {
        let path = self.path_for(key);
        trace!("Writing {} bytes to {:?}", value.len(), path);
        fs::write(&path, value)
            .map_err(|e| TdeError::PersistFailed(format!("writing {:?}: {}", path, e)))
    }
}

#[cfg(test)]
pub use memstore::MemStore;
