// Submission domain models.
//
// The payload types mirror what the host hands us: every field is optional and
// the entry points decide what a missing field means.

use crate::core::leaderboard::LeaderboardError;
use crate::core::platform::PlatformError;
use crate::core::scores::ScoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Account fullname, e.g. `t2_abc123`.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub name: String,
}

/// A post or comment, identified by its fullname (`t3_...` / `t1_...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: String,
}

/// A new comment was submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSubmit {
    pub author: Option<Author>,
    pub subreddit: Option<Community>,
    pub comment: Option<ContentRef>,
}

/// A new post was submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSubmit {
    pub author: Option<Author>,
    pub subreddit: Option<Community>,
    pub post: Option<ContentRef>,
}

/// What happened on the ban branch of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum BanOutcome {
    /// Roll was at or below the threshold.
    Spared,
    /// Banned and the explanation reply was posted.
    Banned,
    /// Banned, but posting the reply failed. Nothing is rolled back.
    BannedWithoutNotice { error: String },
}

impl BanOutcome {
    pub fn is_banned(&self) -> bool {
        !matches!(self, BanOutcome::Spared)
    }
}

/// Result of handling one submission, returned for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub username: String,
    pub subreddit: String,
    /// The user's count after this submission.
    pub count: u64,
    pub roll: f64,
    pub ban: BanOutcome,
    /// Id of the freshly published leaderboard widget.
    pub widget_id: String,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Score error: {0}")]
    Score(#[from] ScoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Leaderboard error: {0}")]
    Leaderboard(#[from] LeaderboardError),

    #[error("Event is missing `{0}`")]
    MalformedEvent(&'static str),
}
