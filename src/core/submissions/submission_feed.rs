use super::submission_models::{CommentSubmit, PostSubmit};
use crate::core::platform::{PlatformError, RequestContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One listed post or comment, wrapped with what the event source needs to
/// order and deduplicate it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem<T> {
    /// Fullname of the post or comment.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub event: T,
}

/// Where new submissions come from. Listings are newest first, like Reddit's.
#[async_trait]
pub trait SubmissionFeed: Send + Sync {
    async fn latest_posts(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<PostSubmit>>, PlatformError>;

    async fn latest_comments(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<CommentSubmit>>, PlatformError>;
}

#[async_trait]
impl<T: SubmissionFeed + ?Sized> SubmissionFeed for Arc<T> {
    async fn latest_posts(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<PostSubmit>>, PlatformError> {
        (**self).latest_posts(subreddit, ctx).await
    }

    async fn latest_comments(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<CommentSubmit>>, PlatformError> {
        (**self).latest_comments(subreddit, ctx).await
    }
}
