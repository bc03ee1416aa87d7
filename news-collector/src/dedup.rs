use crate::storage::{ensure_dir, read_optional, write_atomic};
use crate::types::{identity_hash, Result, Source, KEEP};
use std::path::{Path, PathBuf};
use tracing::debug;

const SEEN_FILE: &str = ".seen";

/// Url and title hashes of articles already collected for one source,
/// oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    hashes: Vec<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hashes(hashes: Vec<String>) -> Self {
        Self { hashes }
    }

    /// True if the url or the title has been recorded before. A blank
    /// title never matches.
    pub fn contains(&self, url: &str, title: &str) -> bool {
        let url_hash = identity_hash(url);
        let title_hash = title_key(title);
        self.hashes
            .iter()
            .any(|h| *h == url_hash || title_hash.as_ref() == Some(h))
    }

    /// Appends the url hash and, unless the title is blank, the title hash.
    /// Hashes already present are not repeated. The cap is applied on save,
    /// not here.
    pub fn record(&mut self, url: &str, title: &str) {
        for hash in std::iter::once(identity_hash(url)).chain(title_key(title)) {
            if !self.hashes.contains(&hash) {
                self.hashes.push(hash);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    /// Drop the oldest hashes until at most `cap` remain.
    pub fn truncate_oldest(&mut self, cap: usize) {
        if self.hashes.len() > cap {
            let excess = self.hashes.len() - cap;
            self.hashes.drain(..excess);
        }
    }
}

/// Per-source seen-set persistence under `<data_dir>/<domain>/.seen`.
#[derive(Debug, Clone)]
pub struct DedupStore {
    data_dir: PathBuf,
    keep: usize,
}

impl DedupStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_keep(data_dir, KEEP)
    }

    /// `keep` counts articles; the set holds two hashes per article.
    pub fn with_keep(data_dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            keep,
        }
    }

    pub fn capacity(&self) -> usize {
        self.keep * 2
    }

    pub fn path_for(&self, source: &Source) -> PathBuf {
        source_dir(&self.data_dir, source).join(SEEN_FILE)
    }

    /// A source without a persisted set starts empty.
    pub fn load(&self, source: &Source) -> Result<SeenSet> {
        let path = self.path_for(source);
        let seen = match read_optional(&path)? {
            Some(bytes) => SeenSet::from_hashes(serde_json::from_slice(&bytes)?),
            None => SeenSet::new(),
        };
        debug!(domain = %source.domain, hashes = seen.len(), "Loaded seen set");
        Ok(seen)
    }

    pub fn save(&self, source: &Source, seen: &mut SeenSet) -> Result<()> {
        seen.truncate_oldest(self.capacity());

        let path = self.path_for(source);
        ensure_dir(&source_dir(&self.data_dir, source))?;
        write_atomic(&path, &serde_json::to_vec(seen.hashes())?)?;

        debug!(domain = %source.domain, hashes = seen.len(), "Saved seen set");
        Ok(())
    }
}

// Untitled entries would otherwise all share the hash of "".
fn title_key(title: &str) -> Option<String> {
    (!title.trim().is_empty()).then(|| identity_hash(title))
}

pub(crate) fn source_dir(data_dir: &Path, source: &Source) -> PathBuf {
    data_dir.join(&source.domain)
}
