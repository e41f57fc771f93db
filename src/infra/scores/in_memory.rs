// In-memory implementation of ScoreStore.
//
// Nothing survives a restart. Handy for local runs and tests.

use crate::core::platform::RequestContext;
use crate::core::scores::{ScoreError, ScoreRecord, ScoreStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// Maps subreddit -> record.
///
/// **DashMap:**
/// The entry API locks a single shard, so `increment` is atomic even when
/// several events for the same subreddit arrive at once.
pub struct InMemoryScoreStore {
    records: DashMap<String, ScoreRecord>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn load(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<ScoreRecord, ScoreError> {
        Ok(self
            .records
            .get(subreddit)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(
        &self,
        subreddit: &str,
        record: &ScoreRecord,
        _ctx: &RequestContext,
    ) -> Result<(), ScoreError> {
        self.records.insert(subreddit.to_string(), record.clone());
        Ok(())
    }

    async fn increment(
        &self,
        subreddit: &str,
        username: &str,
        _ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        let mut record = self.records.entry(subreddit.to_string()).or_default();
        Ok(record.increment(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::new("t2_bot", "test")
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryScoreStore::new();
        let ctx = ctx();

        // Nothing stored yet
        assert!(store.load("lucky", &ctx).await.unwrap().is_empty());

        assert_eq!(store.increment("lucky", "alice", &ctx).await.unwrap(), 1);
        assert_eq!(store.increment("lucky", "alice", &ctx).await.unwrap(), 2);

        let record = store.load("lucky", &ctx).await.unwrap();
        assert_eq!(record.get("alice"), Some(2));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryScoreStore::new());
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment("lucky", "alice", &ctx()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = store.load("lucky", &ctx()).await.unwrap();
        assert_eq!(record.get("alice"), Some(50));
    }
}
