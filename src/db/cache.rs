//! Content-addressed cache of query results.
//!
//! Training queries are expensive joins over millions of rows; running them
//! once per machine is enough. Each result set is stored as one bincode
//! file named by the SHA-1 of the exact query string, so identical queries
//! map to identical storage locations.
//!
//! Invariants:
//! - Keys are order- and whitespace-sensitive: the query builder emits
//!   byte-identical strings for logically identical requests.
//! - Entries are immutable once fully written. Identical query means
//!   identical key means identical result, so re-writing is redundant.
//! - Writes go to a temp file and are renamed into place, so concurrent
//!   readers (other processes sharing the cache directory) never observe a
//!   partial file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

use crate::dataset::table::DataTable;

/// File-backed cache keyed by query hash.
#[derive(Debug, Clone)]
pub struct QueryCache {
    dir: PathBuf,
}

impl QueryCache {
    /// Open the cache rooted at `dir/cache`, creating it if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        let dir = dir.join("cache");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Stable cache key for a query string.
    pub fn key(sql: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(sql.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Path of the (complete) entry for a key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin.tmp{}", key, std::process::id()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    /// Deserialize the cached result for a key, if present.
    pub fn lookup(&self, key: &str) -> Result<Option<DataTable>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read cache entry: {}", path.display()))?;
        let table = bincode::deserialize(&bytes)
            .with_context(|| format!("corrupt cache entry: {}", path.display()))?;
        Ok(Some(table))
    }

    /// Persist a result set under its key.
    ///
    /// A no-op if a complete entry already exists. The temp file is cleaned
    /// up on any failure.
    pub fn store(&self, key: &str, table: &DataTable) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            return Ok(());
        }

        let temp = self.temp_path(key);
        let result = (|| -> Result<()> {
            let bytes = bincode::serialize(table).context("failed to serialize result set")?;
            fs::write(&temp, bytes)
                .with_context(|| format!("failed to write cache entry: {}", temp.display()))?;
            fs::rename(&temp, &path)
                .with_context(|| format!("failed to finalize cache entry: {}", path.display()))?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }

    /// Remove any partially written file for a key. Called on interruption
    /// mid-fetch; a partial entry is worse than no entry, because the next
    /// run would treat it as valid.
    pub fn discard_partial(&self, key: &str) {
        let _ = fs::remove_file(self.temp_path(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Column;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("refpredict_test_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_table(value: f64) -> DataTable {
        let mut t = DataTable::new();
        t.push_column("metric", Column::Num(vec![Some(value), Some(value + 1.0)]))
            .unwrap();
        t.push_column(
            "db_id",
            Column::Str(vec![Some("RefactoringCommit.1".into()), Some("RefactoringCommit.2".into())]),
        )
        .unwrap();
        t
    }

    #[test]
    fn test_key_is_whitespace_sensitive() {
        assert_eq!(QueryCache::key("SELECT 1"), QueryCache::key("SELECT 1"));
        assert_ne!(QueryCache::key("SELECT 1"), QueryCache::key("SELECT  1"));
        assert_ne!(QueryCache::key("SELECT a, b"), QueryCache::key("SELECT b, a"));
    }

    #[test]
    fn test_roundtrip() {
        let dir = test_dir("roundtrip");
        let cache = QueryCache::open(&dir).unwrap();
        let key = QueryCache::key("SELECT something");

        assert!(cache.lookup(&key).unwrap().is_none());

        let table = sample_table(1.0);
        cache.store(&key, &table).unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.lookup(&key).unwrap(), Some(table));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_entries_are_immutable() {
        let dir = test_dir("immutable");
        let cache = QueryCache::open(&dir).unwrap();
        let key = QueryCache::key("SELECT something");

        let first = sample_table(1.0);
        cache.store(&key, &first).unwrap();
        // A second store under the same key must not overwrite.
        cache.store(&key, &sample_table(99.0)).unwrap();
        assert_eq!(cache.lookup(&key).unwrap(), Some(first));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_discard_partial_leaves_complete_entries() {
        let dir = test_dir("discard");
        let cache = QueryCache::open(&dir).unwrap();
        let key = QueryCache::key("SELECT something");

        let table = sample_table(2.0);
        cache.store(&key, &table).unwrap();
        cache.discard_partial(&key);
        assert_eq!(cache.lookup(&key).unwrap(), Some(table));

        let _ = fs::remove_dir_all(&dir);
    }
}
