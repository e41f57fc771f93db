// The submission handler: count, roll, maybe ban, republish.
//
// Steps run one after another. The only thing that does not stop the flow is a
// failed ban notice, which is reported as `BanOutcome::BannedWithoutNotice`.

use super::submission_models::{BanOutcome, SubmissionError, SubmissionOutcome};
use crate::core::leaderboard::LeaderboardService;
use crate::core::platform::{BanRequest, CommentRequest, RedditPlatform, RequestContext};
use crate::core::scores::{ScoreService, ScoreStore};
use rand::Rng;

/// Rolls strictly above this get banned (about 1 in 100).
pub const LUCK_THRESHOLD: f64 = 0.99;

pub const BAN_MESSAGE: &str = "Unlucky. :(";
pub const BAN_NOTICE: &str = "User was banned for being unlucky when submitting this.";

/// Source of the uniform `[0, 1)` draw.
pub trait LuckRoll: Send + Sync {
    fn roll(&self) -> f64;
}

/// Production roll backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngRoll;

impl LuckRoll for ThreadRngRoll {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Everything a submission needs, wired once in `main`.
pub struct SubmissionService<S, P, R = ThreadRngRoll>
where
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    scores: ScoreService<S>,
    leaderboard: LeaderboardService<S, P>,
    platform: P,
    luck: R,
}

impl<S, P, R> SubmissionService<S, P, R>
where
    S: ScoreStore + Clone,
    P: RedditPlatform + Clone,
    R: LuckRoll,
{
    pub fn new(store: S, platform: P, luck: R) -> Self {
        Self {
            scores: ScoreService::new(store.clone()),
            leaderboard: LeaderboardService::new(store, platform.clone()),
            platform,
            luck,
        }
    }
}

impl<S, P, R> SubmissionService<S, P, R>
where
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    /// Handle one post or comment by `username` in `subreddit`.
    ///
    /// `content_id` is the fullname the ban notice replies to.
    pub async fn handle(
        &self,
        username: &str,
        subreddit: &str,
        content_id: &str,
        ctx: &RequestContext,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        // 1. Count the submission
        let count = self.scores.increment(username, subreddit, ctx).await?;

        // 2. Roll
        let roll = self.luck.roll();

        // 3. Ban the unlucky
        let ban = if roll > LUCK_THRESHOLD {
            self.ban_unlucky(username, subreddit, content_id, roll, ctx)
                .await?
        } else {
            BanOutcome::Spared
        };

        // 4. Republish, whatever happened above
        let widget = self.leaderboard.publish(subreddit, ctx).await?;

        Ok(SubmissionOutcome {
            username: username.to_string(),
            subreddit: subreddit.to_string(),
            count,
            roll,
            ban,
            widget_id: widget.id,
        })
    }

    /// Ban, then explain. A failed ban aborts; a failed explanation does not.
    async fn ban_unlucky(
        &self,
        username: &str,
        subreddit: &str,
        content_id: &str,
        roll: f64,
        ctx: &RequestContext,
    ) -> Result<BanOutcome, SubmissionError> {
        self.platform
            .ban_user(
                &BanRequest {
                    username: username.to_string(),
                    subreddit: subreddit.to_string(),
                    message: BAN_MESSAGE.to_string(),
                },
                ctx,
            )
            .await?;

        tracing::info!(username, subreddit, roll, "User banned for being unlucky");

        let notice = self
            .platform
            .submit_comment(
                &CommentRequest {
                    parent_id: content_id.to_string(),
                    text: BAN_NOTICE.to_string(),
                },
                ctx,
            )
            .await;

        match notice {
            Ok(()) => Ok(BanOutcome::Banned),
            Err(e) => {
                tracing::warn!(
                    username,
                    subreddit,
                    content_id,
                    "User banned but the ban notice could not be posted: {}",
                    e
                );
                Ok(BanOutcome::BannedWithoutNotice {
                    error: e.to_string(),
                })
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
