use crate::dedup::source_dir;
use crate::storage::{ensure_dir, read_optional, write_atomic};
use crate::types::{Article, CollectorError, Result, Source};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::info;

/// Day-partitioned article archives, one JSON array per source per day,
/// stored as `<data_dir>/<domain>/<hash(feed url)>_<YYYYMMDD>.json`.
///
/// Appends are read-modify-write. The rename makes each write whole, but
/// two processes appending to the same file can still lose each other's
/// batch.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    data_dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, source: &Source, day: NaiveDate) -> PathBuf {
        source_dir(&self.data_dir, source).join(format!(
            "{}_{}.json",
            source.url_hash(),
            day.format("%Y%m%d")
        ))
    }

    pub fn append(&self, source: &Source, day: NaiveDate, articles: &[Article]) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }

        let path = self.path_for(source, day);
        let mut stored: Vec<Article> = match read_optional(&path)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        let previous = stored.len();
        stored.extend_from_slice(articles);

        ensure_dir(&source_dir(&self.data_dir, source))?;
        write_atomic(&path, &serde_json::to_vec(&stored)?)?;

        info!(
            feed = %source.url,
            day = %day,
            added = articles.len(),
            total = stored.len(),
            "Archived {} articles ({} already stored)",
            articles.len(),
            previous
        );
        Ok(())
    }

    /// Every archived article for `source`, oldest day first.
    pub fn load_articles(&self, source: &Source) -> Result<Vec<Article>> {
        let dir = source_dir(&self.data_dir, source);
        let prefix = format!("{}_", source.url_hash());

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CollectorError::io(&dir, e)),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut articles = Vec::new();
        for path in files {
            let bytes = fs::read(&path).map_err(|e| CollectorError::io(&path, e))?;
            let batch: Vec<Article> = serde_json::from_slice(&bytes)?;
            articles.extend(batch);
        }
        Ok(articles)
    }
}
