use crate::core::platform::RequestContext;
use crate::core::scores::{ScoreError, ScoreRecord, ScoreStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// JSON-based score store. All subreddits live in one file:
/// { subreddit: { username: count } }
pub struct JsonScoreStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, ScoreRecord>>,
}

impl JsonScoreStore {
    /// Open (or start) the file at `path`. A corrupt file is an error rather
    /// than a silent reset, since it holds every score we have.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ScoreError> {
        let path = path.into();
        let cache = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Write to a sibling temp file, then rename it over the real one so the
    /// file on disk is always either the old or the new version.
    fn persist(&self, cache: &HashMap<String, ScoreRecord>) -> Result<(), ScoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(cache)?;

        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for JsonScoreStore {
    async fn load(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<ScoreRecord, ScoreError> {
        let cache = self.cache.read().await;
        Ok(cache.get(subreddit).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        subreddit: &str,
        record: &ScoreRecord,
        _ctx: &RequestContext,
    ) -> Result<(), ScoreError> {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        next.insert(subreddit.to_string(), record.clone());
        self.persist(&next)?;
        *cache = next;
        Ok(())
    }

    // Read, bump and write under one write lock. The cache only changes once
    // the file has been written.
    async fn increment(
        &self,
        subreddit: &str,
        username: &str,
        _ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        let count = next
            .entry(subreddit.to_string())
            .or_default()
            .increment(username);
        self.persist(&next)?;
        *cache = next;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx() -> RequestContext {
        RequestContext::new("t2_bot", "test")
    }

    #[tokio::test]
    async fn test_json_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");

        let store = JsonScoreStore::new(path.clone()).unwrap();
        assert_eq!(store.increment("lucky", "alice", &ctx()).await.unwrap(), 1);
        assert_eq!(store.increment("lucky", "alice", &ctx()).await.unwrap(), 2);

        // Reload from file
        let reopened = JsonScoreStore::new(path).unwrap();
        let record = reopened.load("lucky", &ctx()).await.unwrap();
        assert_eq!(record.get("alice"), Some(2));
    }

    #[tokio::test]
    async fn save_replaces_the_whole_record() {
        let dir = tempdir().unwrap();
        let store = JsonScoreStore::new(dir.path().join("scores.json")).unwrap();

        store.increment("lucky", "alice", &ctx()).await.unwrap();

        let mut replacement = ScoreRecord::new();
        replacement.insert("bob", 4);
        store.save("lucky", &replacement, &ctx()).await.unwrap();

        let record = store.load("lucky", &ctx()).await.unwrap();
        assert_eq!(record.get("alice"), None);
        assert_eq!(record.get("bob"), Some(4));
    }

    #[tokio::test]
    async fn failed_write_does_not_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let store = JsonScoreStore::new(path.clone()).unwrap();

        // Nothing can be renamed over a directory.
        std::fs::create_dir(&path).unwrap();

        assert!(store.increment("lucky", "alice", &ctx()).await.is_err());
        let record = store.load("lucky", &ctx()).await.unwrap();
        assert_eq!(record.get("alice"), None);

        let mut replacement = ScoreRecord::new();
        replacement.insert("bob", 4);
        assert!(store.save("lucky", &replacement, &ctx()).await.is_err());
        assert!(store.load("lucky", &ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interrupted_write_keeps_the_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let store = JsonScoreStore::new(path.clone()).unwrap();
        store.increment("lucky", "alice", &ctx()).await.unwrap();
        assert!(!store.temp_path().exists());

        // Block the temp file so the next write fails before the rename.
        std::fs::create_dir(store.temp_path()).unwrap();
        assert!(store.increment("lucky", "alice", &ctx()).await.is_err());

        let reopened = JsonScoreStore::new(path).unwrap();
        let record = reopened.load("lucky", &ctx()).await.unwrap();
        assert_eq!(record.get("alice"), Some(1));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonScoreStore::new(path),
            Err(ScoreError::Serialization(_))
        ));
    }
}
