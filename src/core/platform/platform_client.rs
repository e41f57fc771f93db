// The platform module describes everything the bot needs from Reddit.
// Like the score store, it is a "port": the core only knows these types and the
// trait, the infra layer provides the HTTP implementation.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

/// Per-event token forwarded to every store and platform call.
///
/// **Why is this always an explicit parameter?**
/// Every call site has to decide which context it forwards. There is no
/// hidden "default" context a nested call can silently fall back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Fullname (`t2_...`) of the account the bot acts as.
    pub app_user_id: String,
    /// Identifies the event being processed, used in log lines.
    pub request_id: String,
}

impl RequestContext {
    pub fn new(app_user_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            app_user_id: app_user_id.into(),
            request_id: request_id.into(),
        }
    }

    /// Is `author_id` the bot's own service account?
    pub fn is_app_user(&self, author_id: &str) -> bool {
        self.app_user_id == author_id
    }
}

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A sidebar widget that already exists in a subreddit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    pub id: String,
    pub kind: String,
    pub short_name: String,
}

/// Colours applied to a text-area widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetStyles {
    pub background_color: String,
    pub header_color: String,
}

/// Everything needed to create a new widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWidget {
    pub kind: String,
    pub short_name: String,
    pub subreddit: String,
    pub text: String,
    pub styles: WidgetStyles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRequest {
    pub username: String,
    pub subreddit: String,
    pub message: String,
}

/// A reply to a post or comment. `parent_id` is the parent's fullname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub parent_id: String,
    pub text: String,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Reddit API error: {0}")]
    Api(String),

    #[error("Reddit authentication failed: {0}")]
    Auth(String),

    #[error("Reddit returned {status}: {body}")]
    Status { status: u16, body: String },
}

// ============================================================================
// PLATFORM TRAIT (PORT)
// ============================================================================

/// The Reddit operations used by the leaderboard and the submission handler.
#[async_trait]
pub trait RedditPlatform: Send + Sync {
    async fn get_widgets(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<Widget>, PlatformError>;

    async fn delete_widget(
        &self,
        subreddit: &str,
        widget_id: &str,
        ctx: &RequestContext,
    ) -> Result<(), PlatformError>;

    async fn add_widget(
        &self,
        widget: &NewWidget,
        ctx: &RequestContext,
    ) -> Result<Widget, PlatformError>;

    async fn ban_user(&self, ban: &BanRequest, ctx: &RequestContext) -> Result<(), PlatformError>;

    async fn submit_comment(
        &self,
        comment: &CommentRequest,
        ctx: &RequestContext,
    ) -> Result<(), PlatformError>;
}

// Lets several services share one client behind an Arc.
#[async_trait]
impl<T: RedditPlatform + ?Sized> RedditPlatform for Arc<T> {
    async fn get_widgets(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<Widget>, PlatformError> {
        (**self).get_widgets(subreddit, ctx).await
    }

    async fn delete_widget(
        &self,
        subreddit: &str,
        widget_id: &str,
        ctx: &RequestContext,
    ) -> Result<(), PlatformError> {
        (**self).delete_widget(subreddit, widget_id, ctx).await
    }

    async fn add_widget(
        &self,
        widget: &NewWidget,
        ctx: &RequestContext,
    ) -> Result<Widget, PlatformError> {
        (**self).add_widget(widget, ctx).await
    }

    async fn ban_user(&self, ban: &BanRequest, ctx: &RequestContext) -> Result<(), PlatformError> {
        (**self).ban_user(ban, ctx).await
    }

    async fn submit_comment(
        &self,
        comment: &CommentRequest,
        ctx: &RequestContext,
    ) -> Result<(), PlatformError> {
        (**self).submit_comment(comment, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_recognises_its_own_account() {
        let ctx = RequestContext::new("t2_bot", "t1_abc");
        assert!(ctx.is_app_user("t2_bot"));
        assert!(!ctx.is_app_user("t2_someone"));
    }

    #[test]
    fn status_error_mentions_code_and_body() {
        let err = PlatformError::Status {
            status: 403,
            body: "forbidden".into(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("forbidden"));
    }
}
