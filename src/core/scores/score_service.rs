// The scores module owns the per-user submission counter.
// No Reddit types here: just usernames, subreddit names and counts.

use crate::core::platform::RequestContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// How many submissions each user made in one subreddit.
///
/// Stored as a flat JSON object (`{"alice": 3}`). A `BTreeMap` keeps iteration
/// order deterministic, which is also the tie order of the leaderboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreRecord(BTreeMap<String, u64>);

impl ScoreRecord {
    /// Bump `username` by one (inserting it at 1) and return the new count.
    pub fn increment(&mut self, username: &str) -> u64 {
        let count = self.0.entry(username.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

// Lookups only the tests need; the bot itself goes through `iter`.
#[cfg(test)]
impl ScoreRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, username: &str) -> Option<u64> {
        self.0.get(username).copied()
    }

    pub fn insert(&mut self, username: impl Into<String>, count: u64) {
        self.0.insert(username.into(), count);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for ScoreRecord {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persists one `ScoreRecord` per subreddit.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Read the record for `subreddit`. Empty if nothing was stored yet.
    async fn load(&self, subreddit: &str, ctx: &RequestContext)
        -> Result<ScoreRecord, ScoreError>;

    /// Replace the record for `subreddit` with `record`.
    async fn save(
        &self,
        subreddit: &str,
        record: &ScoreRecord,
        ctx: &RequestContext,
    ) -> Result<(), ScoreError>;

    /// Add one to `username` and return the new count.
    ///
    /// The default is a plain read-modify-write: two concurrent calls for the
    /// same subreddit can lose an update. Stores with an atomic primitive
    /// override this.
    async fn increment(
        &self,
        subreddit: &str,
        username: &str,
        ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        let mut record = self.load(subreddit, ctx).await?;
        let count = record.increment(username);
        self.save(subreddit, &record, ctx).await?;
        Ok(count)
    }
}

#[async_trait]
impl<T: ScoreStore + ?Sized> ScoreStore for Arc<T> {
    async fn load(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<ScoreRecord, ScoreError> {
        (**self).load(subreddit, ctx).await
    }

    async fn save(
        &self,
        subreddit: &str,
        record: &ScoreRecord,
        ctx: &RequestContext,
    ) -> Result<(), ScoreError> {
        (**self).save(subreddit, record, ctx).await
    }

    async fn increment(
        &self,
        subreddit: &str,
        username: &str,
        ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        (**self).increment(subreddit, username, ctx).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The counter service.
pub struct ScoreService<S: ScoreStore> {
    store: S,
}

impl<S: ScoreStore> ScoreService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Count one more submission by `username` in `subreddit`.
    pub async fn increment(
        &self,
        username: &str,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        let count = self.store.increment(subreddit, username, ctx).await?;
        tracing::debug!(username, subreddit, count, "Submission counted");
        Ok(count)
    }

    /// Current record for a subreddit.
    #[cfg(test)]
    pub async fn scores(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<ScoreRecord, ScoreError> {
        self.store.load(subreddit, ctx).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
