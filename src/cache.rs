use color_eyre::Result;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Executed SQL statements, oldest first, one per line.
pub const QUERY_HISTORY_FILE: &str = "query_history.txt";

/// Per-user cache directory holding the query history file.
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache rooted at an explicit directory.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }

    /// Remove the stored query history. A missing file is not an error.
    pub fn clear_all(&self) -> Result<()> {
        match fs::remove_file(self.cache_file(QUERY_HISTORY_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load query history. Multi-line statements are stored with newlines collapsed to spaces.
    pub fn load_history(&self) -> Result<Vec<String>> {
        let history_file = self.cache_file(QUERY_HISTORY_FILE);

        if !history_file.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&history_file)?;
        let reader = BufReader::new(file);
        let mut history = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                history.push(line);
            }
        }

        Ok(history)
    }

    /// Save query history, keeping only the most recent `limit` entries.
    pub fn save_history(&self, history: &[String], limit: usize) -> Result<()> {
        self.ensure_cache_dir()?;
        let history_file = self.cache_file(QUERY_HISTORY_FILE);

        let mut file = fs::File::create(&history_file)?;
        let skip = history.len().saturating_sub(limit);
        for entry in &history[skip..] {
            writeln!(file, "{}", entry.split_whitespace().collect::<Vec<_>>().join(" "))?;
        }

        Ok(())
    }
}

/// In-memory query history mirrored to the cache, capped at `limit` entries.
///
/// Without a cache the history is not kept at all.
pub struct QueryHistory {
    cache: Option<CacheManager>,
    entries: Vec<String>,
    limit: usize,
}

impl QueryHistory {
    pub fn open(cache: Option<CacheManager>, limit: usize) -> Self {
        let mut entries = cache
            .as_ref()
            .and_then(|c| c.load_history().ok())
            .unwrap_or_default();
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        Self {
            cache,
            entries,
            limit,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append `sql` and persist. Save failures are logged, not returned.
    pub fn record(&mut self, sql: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        self.entries.push(sql.trim().to_string());
        let skip = self.entries.len().saturating_sub(self.limit);
        self.entries.drain(..skip);
        if let Err(e) = cache.save_history(&self.entries, self.limit) {
            tracing::warn!("could not save query history: {}", e);
        }
    }
}
