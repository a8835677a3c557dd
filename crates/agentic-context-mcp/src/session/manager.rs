//! Store lifecycle: snapshot load, dirty tracking, and periodic saves.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use agentic_context::{ContextStore, SnapshotReader, SnapshotWriter};

use crate::types::{McpError, McpResult};

const DEFAULT_AUTO_SAVE_SECS: u64 = 30;

/// Owns the process-wide store and, when a path is configured, its snapshot file.
pub struct StateManager {
    store: Arc<ContextStore>,
    file_path: Option<PathBuf>,
    dirty: AtomicBool,
    last_save: Mutex<Instant>,
    auto_save_interval: Duration,
}

impl StateManager {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_store(ContextStore::new(), None)
    }

    /// Open the snapshot at `path`, or start empty if it does not exist yet.
    pub fn open(path: &Path) -> McpResult<Self> {
        let store = if path.exists() {
            tracing::info!("Opening existing state file: {}", path.display());
            let snapshot = SnapshotReader::read_from_file(path)
                .map_err(|e| McpError::InternalError(format!("Failed to read state file: {e}")))?;
            ContextStore::from_snapshot(snapshot)
        } else {
            tracing::info!("Creating new state file: {}", path.display());
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        McpError::Io(std::io::Error::other(format!(
                            "Failed to create directory {}: {e}",
                            parent.display()
                        )))
                    })?;
                }
            }
            ContextStore::new()
        };

        let stats = store.stats();
        tracing::info!(
            "State loaded: {} records, {} slots",
            stats.records,
            stats.slots
        );

        Ok(Self::with_store(store, Some(path.to_path_buf())))
    }

    /// Open `path` if given, otherwise keep state in memory.
    pub fn open_or_memory(path: Option<&Path>) -> McpResult<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::in_memory()),
        }
    }

    fn with_store(store: ContextStore, file_path: Option<PathBuf>) -> Self {
        Self {
            store: Arc::new(store),
            file_path,
            dirty: AtomicBool::new(false),
            last_save: Mutex::new(Instant::now()),
            auto_save_interval: Duration::from_secs(DEFAULT_AUTO_SAVE_SECS),
        }
    }

    pub fn with_auto_save_interval(mut self, interval: Duration) -> Self {
        self.auto_save_interval = interval;
        self
    }

    pub fn store(&self) -> Arc<ContextStore> {
        Arc::clone(&self.store)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the snapshot if there are unsaved changes and a path is set.
    pub fn save(&self) -> McpResult<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let mut last_save = self.last_save.lock();

        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(e) = SnapshotWriter::write_to_file(&self.store.snapshot(), path) {
            self.dirty.store(true, Ordering::Release);
            return Err(McpError::InternalError(format!(
                "Failed to write state file: {e}"
            )));
        }

        *last_save = Instant::now();
        tracing::debug!("Saved state file: {}", path.display());
        Ok(())
    }

    /// Save if dirty and the auto-save interval has elapsed.
    pub fn maybe_auto_save(&self) -> McpResult<()> {
        let due = self.last_save.lock().elapsed() >= self.auto_save_interval;
        if due && self.is_dirty() {
            self.save()?;
        }
        Ok(())
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        if self.is_dirty() {
            if let Err(e) = self.save() {
                tracing::error!("Failed to save on drop: {e}");
            }
        }
    }
}
