use color_eyre::Result;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::workbook::{Workbook, WorkbookFormat};

/// Registry of known cache files
const CACHE_FILES: &[&str] = &[crate::logging::LOG_FILE];

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Ensure the cache directory exists
    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    eprintln!("Warning: Could not remove cache file {}: {}", filename, e);
                }
            }
        }

        Ok(())
    }
}

/// SHA-256 of an upload's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough for logs
        for b in &self.0[..6] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Cache slot: the bytes plus the format they were parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    content: ContentKey,
    format: WorkbookFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Parsed workbooks keyed by the hash of their bytes and the parse format, bounded by count
/// with LRU eviction.
///
/// Identical bytes are parsed once; any change to the bytes is a different key. A hit under
/// another upload name is handed back renamed.
pub struct WorkbookCache {
    entries: LruCache<CacheKey, Arc<Workbook>>,
    stats: CacheStats,
}

impl WorkbookCache {
    pub const DEFAULT_CAPACITY: usize = 8;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Cached workbook for `bytes`, parsing on a miss. `format` overrides detection.
    pub fn get_or_parse(
        &mut self,
        source_name: &str,
        bytes: &[u8],
        format: Option<WorkbookFormat>,
    ) -> Result<Arc<Workbook>> {
        let format = format.unwrap_or_else(|| WorkbookFormat::detect(source_name, bytes));
        let key = CacheKey {
            content: ContentKey::of(bytes),
            format,
        };
        if let Some(workbook) = self.entries.get(&key) {
            self.stats.hits += 1;
            debug!(source = source_name, key = %key.content, "workbook cache hit");
            if workbook.source_name == source_name {
                return Ok(Arc::clone(workbook));
            }
            return Ok(Arc::new(workbook.renamed(source_name)));
        }
        self.stats.misses += 1;
        debug!(source = source_name, key = %key.content, "workbook cache miss");
        let workbook = Arc::new(Workbook::from_bytes(source_name, bytes, Some(format))?);
        if let Some((evicted, _)) = self.entries.push(key, Arc::clone(&workbook)) {
            if evicted != key {
                debug!(key = %evicted.content, "evicted workbook");
            }
        }
        Ok(workbook)
    }

    pub fn contains(&self, bytes: &[u8], format: WorkbookFormat) -> bool {
        self.entries.contains(&CacheKey {
            content: ContentKey::of(bytes),
            format,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for WorkbookCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_A: &[u8] = b"Temsilci,Puan\nAli,4\n";
    const CSV_B: &[u8] = b"Temsilci,Puan\nAli,5\n";
    const CSV_C: &[u8] = b"Temsilci,Puan\nVeli,3\n";

    #[test]
    fn test_identical_bytes_hit() {
        let mut cache = WorkbookCache::new(4);
        let first = cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        let second = cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_hit_under_another_name_is_renamed() {
        let mut cache = WorkbookCache::new(4);
        let first = cache.get_or_parse("anket.csv", CSV_A, None).unwrap();
        let second = cache.get_or_parse("cagri.csv", CSV_A, None).unwrap();
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(first.source_name, "anket.csv");
        assert_eq!(first.sheet_names(), vec!["anket"]);
        assert_eq!(second.source_name, "cagri.csv");
        assert_eq!(second.sheet_names(), vec!["cagri"]);
        assert_eq!(second.sheets()[0].frame.height(), 1);
    }

    #[test]
    fn test_format_override_is_a_separate_entry() {
        let mut cache = WorkbookCache::new(4);
        cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        assert!(cache.contains(CSV_A, WorkbookFormat::Csv));
        assert!(!cache.contains(CSV_A, WorkbookFormat::Excel));
        // the same bytes forced to Excel are parsed again, and fail
        assert!(cache
            .get_or_parse("a.csv", CSV_A, Some(WorkbookFormat::Excel))
            .is_err());
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_changed_bytes_miss() {
        let mut cache = WorkbookCache::new(4);
        cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        cache.get_or_parse("a.csv", CSV_B, None).unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = WorkbookCache::new(2);
        cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        cache.get_or_parse("b.csv", CSV_B, None).unwrap();
        cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        cache.get_or_parse("c.csv", CSV_C, None).unwrap();
        assert!(cache.contains(CSV_A, WorkbookFormat::Csv));
        assert!(!cache.contains(CSV_B, WorkbookFormat::Csv));
        assert!(cache.contains(CSV_C, WorkbookFormat::Csv));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = WorkbookCache::new(0);
        cache.get_or_parse("a.csv", CSV_A, None).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_content_key_display_is_hex() {
        let key = ContentKey::of(b"");
        // sha256("") = e3b0c442...
        assert_eq!(key.to_string(), "e3b0c44298fc");
    }

    #[test]
    fn test_clear_all_removes_log() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::with_dir(dir.path().join("callboard"));
        manager.ensure_cache_dir().unwrap();
        fs::write(manager.cache_file("callboard.log"), "x").unwrap();
        manager.clear_all().unwrap();
        assert!(!manager.cache_file("callboard.log").exists());
    }
}
