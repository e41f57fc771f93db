// Entry points for "comment submitted" and "post submitted".
//
// These are plain async functions so any event source (the poller, a webhook,
// a test) can drive them. Both filter out the bot's own account before doing
// anything else.

use super::submission_models::{
    Author, CommentSubmit, Community, ContentRef, PostSubmit, SubmissionError,
};
use super::submission_service::{LuckRoll, SubmissionService};
use crate::core::platform::{RedditPlatform, RequestContext};
use crate::core::scores::ScoreStore;

pub async fn on_comment_submit<S, P, R>(
    service: &SubmissionService<S, P, R>,
    event: CommentSubmit,
    ctx: &RequestContext,
) -> Result<(), SubmissionError>
where
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    dispatch(service, event.author, event.subreddit, event.comment, "comment", ctx).await
}

pub async fn on_post_submit<S, P, R>(
    service: &SubmissionService<S, P, R>,
    event: PostSubmit,
    ctx: &RequestContext,
) -> Result<(), SubmissionError>
where
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    dispatch(service, event.author, event.subreddit, event.post, "post", ctx).await
}

async fn dispatch<S, P, R>(
    service: &SubmissionService<S, P, R>,
    author: Option<Author>,
    subreddit: Option<Community>,
    content: Option<ContentRef>,
    content_field: &'static str,
    ctx: &RequestContext,
) -> Result<(), SubmissionError>
where
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    let author = author.ok_or(SubmissionError::MalformedEvent("author"))?;

    if ctx.is_app_user(&author.id) {
        tracing::debug!(request_id = %ctx.request_id, "Ignoring our own submission");
        return Ok(());
    }

    let subreddit = subreddit.ok_or(SubmissionError::MalformedEvent("subreddit"))?;
    let content = content.ok_or(SubmissionError::MalformedEvent(content_field))?;

    let outcome = service
        .handle(&author.name, &subreddit.name, &content.id, ctx)
        .await?;

    tracing::debug!(
        request_id = %ctx.request_id,
        username = %outcome.username,
        subreddit = %outcome.subreddit,
        count = outcome.count,
        roll = outcome.roll,
        banned = outcome.ban.is_banned(),
        "Submission handled"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submissions::submission_service::tests::{
        ctx, make_service, RecordingPlatform,
    };
    use std::sync::atomic::Ordering;

    fn author(id: &str, name: &str) -> Option<Author> {
        Some(Author {
            id: id.into(),
            name: name.into(),
        })
    }

    fn community(name: &str) -> Option<Community> {
        Some(Community { name: name.into() })
    }

    fn content(id: &str) -> Option<ContentRef> {
        Some(ContentRef { id: id.into() })
    }

    #[tokio::test]
    async fn comment_from_a_user_is_handled() {
        let (service, store, platform) = make_service(0.5, RecordingPlatform::default());
        let event = CommentSubmit {
            author: author("t2_alice", "alice"),
            subreddit: community("lucky"),
            comment: content("t1_c"),
        };

        on_comment_submit(&service, event, &ctx()).await.unwrap();

        assert_eq!(store.records.get("lucky").unwrap().get("alice"), Some(1));
        assert_eq!(platform.widget_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unlucky_post_gets_a_reply_on_the_post() {
        let (service, _, platform) = make_service(0.995, RecordingPlatform::default());
        let event = PostSubmit {
            author: author("t2_bob", "bob"),
            subreddit: community("lucky"),
            post: content("t3_p"),
        };

        on_post_submit(&service, event, &ctx()).await.unwrap();

        let comments = platform.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].parent_id, "t3_p");
    }

    #[tokio::test]
    async fn own_submissions_are_ignored() {
        let (service, store, platform) = make_service(0.999, RecordingPlatform::default());
        let ctx = ctx();

        let comment = CommentSubmit {
            author: author(&ctx.app_user_id, "luckybot"),
            subreddit: community("lucky"),
            comment: content("t1_reply"),
        };
        let post = PostSubmit {
            author: author(&ctx.app_user_id, "luckybot"),
            subreddit: community("lucky"),
            post: content("t3_own"),
        };

        on_comment_submit(&service, comment, &ctx).await.unwrap();
        on_post_submit(&service, post, &ctx).await.unwrap();

        assert_eq!(store.increments.load(Ordering::SeqCst), 0);
        assert!(platform.bans.lock().unwrap().is_empty());
        assert_eq!(platform.widget_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let (service, store, _) = make_service(0.5, RecordingPlatform::default());

        let no_author = CommentSubmit {
            author: None,
            subreddit: community("lucky"),
            comment: content("t1_c"),
        };
        let err = on_comment_submit(&service, no_author, &ctx()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedEvent("author")));

        let no_post = PostSubmit {
            author: author("t2_alice", "alice"),
            subreddit: community("lucky"),
            post: None,
        };
        let err = on_post_submit(&service, no_post, &ctx()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedEvent("post")));

        assert_eq!(store.increments.load(Ordering::SeqCst), 0);
    }
}
