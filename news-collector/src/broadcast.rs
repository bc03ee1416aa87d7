//! Fan-out of collected articles to listener logs.
//!
//! Every listener is an append-only file holding one JSON article per line.
//! Other processes may append to the same files, so each append happens
//! under an exclusive advisory lock on `<lock_dir>/<md5(listener)>.lock`.
//! The lock name depends only on the listener identifier exactly as it
//! appears in the registry; any cooperating writer has to derive it the
//! same way (see [`lock_path`]).

use crate::types::{identity_hash, Article, CollectorError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    id: String,
}

impl Listener {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn log_path(&self) -> &Path {
        Path::new(&self.id)
    }
}

/// Reads the listener registry, one path per line. A registry that is
/// missing or unreadable means nobody is listening.
pub fn load_listeners(path: &Path) -> Vec<Listener> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Listener::new)
            .collect(),
        Err(e) => {
            debug!("No listener registry at {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Lock file guarding `listener`'s log inside `lock_dir`.
pub fn lock_path(lock_dir: &Path, listener: &Listener) -> PathBuf {
    lock_dir.join(format!("{}.lock", identity_hash(listener.id())))
}

struct ListenerLock {
    file: File,
}

impl ListenerLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| CollectorError::io(path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| CollectorError::io(path, e))?;
        Ok(Self { file })
    }
}

impl Drop for ListenerLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release listener lock: {}", e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    lock_dir: PathBuf,
    cancel: Option<CancellationToken>,
}

impl Broadcaster {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            cancel: None,
        }
    }

    /// Stop between listener writes once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Append `article` to every listener log in order. Returns how many
    /// listeners received it; fewer than `listeners.len()` only when
    /// cancelled part way. Writes already made are never rolled back.
    pub fn broadcast(&self, article: &Article, listeners: &[Listener]) -> Result<usize> {
        if listeners.is_empty() {
            return Ok(0);
        }

        let mut line = serde_json::to_string(article)?;
        line.push('\n');

        let mut delivered = 0;
        for listener in listeners {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                break;
            }
            self.append_line(listener, line.as_bytes())?;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn append_line(&self, listener: &Listener, line: &[u8]) -> Result<()> {
        let _lock = ListenerLock::acquire(&lock_path(&self.lock_dir, listener))?;

        let path = listener.log_path();
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CollectorError::io(path, e))?;
        log.write_all(line).map_err(|e| CollectorError::io(path, e))?;

        debug!(listener = listener.id(), bytes = line.len(), "Appended article");
        Ok(())
    }
}
