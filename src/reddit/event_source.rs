// Polls a subreddit's newest posts and comments and feeds them to the entry
// points, playing the part of an event dispatcher.
//
// The first poll only records what is already there, so a restart does not
// replay the whole front page through the ban roll.

use crate::core::platform::{PlatformError, RedditPlatform, RequestContext};
use crate::core::scores::ScoreStore;
use crate::core::submissions::{
    on_comment_submit, on_post_submit, CommentSubmit, FeedItem, LuckRoll, PostSubmit,
    SubmissionFeed, SubmissionService,
};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How many fullnames we remember. Comfortably more than two listings.
const SEEN_CAPACITY: usize = 1_000;

/// Bounded set of fullnames that were already dispatched (or primed).
struct SeenWindow {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: &str) {
        if !self.ids.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

enum Pending {
    Post(FeedItem<PostSubmit>),
    Comment(FeedItem<CommentSubmit>),
}

impl Pending {
    fn id(&self) -> &str {
        match self {
            Pending::Post(item) => &item.id,
            Pending::Comment(item) => &item.id,
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        match self {
            Pending::Post(item) => item.created_at,
            Pending::Comment(item) => item.created_at,
        }
    }
}

pub struct EventSource<F, S, P, R>
where
    F: SubmissionFeed,
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    feed: F,
    service: Arc<SubmissionService<S, P, R>>,
    subreddit: String,
    app_user_id: String,
    seen: SeenWindow,
    primed: bool,
}

impl<F, S, P, R> EventSource<F, S, P, R>
where
    F: SubmissionFeed,
    S: ScoreStore,
    P: RedditPlatform,
    R: LuckRoll,
{
    pub fn new(
        feed: F,
        service: Arc<SubmissionService<S, P, R>>,
        subreddit: impl Into<String>,
        app_user_id: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            service,
            subreddit: subreddit.into(),
            app_user_id: app_user_id.into(),
            seen: SeenWindow::new(SEEN_CAPACITY),
            primed: false,
        }
    }

    /// Fetch both listings once and dispatch anything new, oldest first.
    ///
    /// Returns how many events were dispatched. A failing event is logged and
    /// does not stop the others.
    pub async fn poll_once(&mut self) -> Result<usize, PlatformError> {
        let poll_ctx = RequestContext::new(
            self.app_user_id.clone(),
            format!("poll:{}", self.subreddit),
        );

        let posts = self.feed.latest_posts(&self.subreddit, &poll_ctx).await?;
        let comments = self.feed.latest_comments(&self.subreddit, &poll_ctx).await?;

        let mut pending: Vec<Pending> = posts
            .into_iter()
            .map(Pending::Post)
            .chain(comments.into_iter().map(Pending::Comment))
            .filter(|p| !self.seen.contains(p.id()))
            .collect();
        pending.sort_by_key(Pending::created_at);

        if !self.primed {
            for item in &pending {
                self.seen.insert(item.id());
            }
            self.primed = true;
            tracing::info!(
                subreddit = %self.subreddit,
                skipped = pending.len(),
                "Event source primed"
            );
            return Ok(0);
        }

        let mut dispatched = 0;
        for item in pending {
            self.seen.insert(item.id());
            let ctx = RequestContext::new(self.app_user_id.clone(), item.id());

            let result = match item {
                Pending::Post(item) => on_post_submit(&self.service, item.event, &ctx).await,
                Pending::Comment(item) => on_comment_submit(&self.service, item.event, &ctx).await,
            };

            if let Err(e) = result {
                tracing::error!(
                    subreddit = %self.subreddit,
                    request_id = %ctx.request_id,
                    "Failed to handle submission: {}",
                    e
                );
            }
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Poll every `interval` until `shutdown` flips.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(subreddit = %self.subreddit, ?interval, "Watching subreddit");

        loop {
            match self.poll_once().await {
                Ok(0) => tracing::debug!(subreddit = %self.subreddit, "No new submissions"),
                Ok(count) => {
                    tracing::info!(subreddit = %self.subreddit, count, "Dispatched submissions")
                }
                Err(e) => tracing::warn!(subreddit = %self.subreddit, "Poll failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!(subreddit = %self.subreddit, "Stopped watching subreddit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submissions::submission_service::tests::{
        make_service, RecordingPlatform,
    };
    use crate::core::submissions::{Author, Community, ContentRef};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedFeed {
        posts: Mutex<Vec<FeedItem<PostSubmit>>>,
        comments: Mutex<Vec<FeedItem<CommentSubmit>>>,
    }

    #[async_trait]
    impl SubmissionFeed for ScriptedFeed {
        async fn latest_posts(
            &self,
            _: &str,
            _: &RequestContext,
        ) -> Result<Vec<FeedItem<PostSubmit>>, PlatformError> {
            Ok(self.posts.lock().unwrap().clone())
        }

        async fn latest_comments(
            &self,
            _: &str,
            _: &RequestContext,
        ) -> Result<Vec<FeedItem<CommentSubmit>>, PlatformError> {
            Ok(self.comments.lock().unwrap().clone())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn post(id: &str, author_id: &str, secs: i64) -> FeedItem<PostSubmit> {
        FeedItem {
            id: id.into(),
            created_at: at(secs),
            event: PostSubmit {
                author: Some(Author {
                    id: author_id.into(),
                    name: author_id.trim_start_matches("t2_").into(),
                }),
                subreddit: Some(Community {
                    name: "lucky".into(),
                }),
                post: Some(ContentRef { id: id.into() }),
            },
        }
    }

    fn comment(id: &str, author_id: &str, secs: i64) -> FeedItem<CommentSubmit> {
        let post = post(id, author_id, secs);
        FeedItem {
            id: post.id,
            created_at: post.created_at,
            event: CommentSubmit {
                author: post.event.author,
                subreddit: post.event.subreddit,
                comment: post.event.post,
            },
        }
    }

    #[test]
    fn seen_window_forgets_oldest() {
        let mut seen = SeenWindow::new(2);
        seen.insert("a");
        seen.insert("b");
        seen.insert("c");

        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
    }

    #[tokio::test]
    async fn first_poll_only_primes() {
        let (service, store, _) = make_service(0.5, RecordingPlatform::default());
        let feed = Arc::new(ScriptedFeed::default());
        feed.posts.lock().unwrap().push(post("t3_old", "t2_alice", 0));

        let mut source = EventSource::new(Arc::clone(&feed), Arc::new(service), "lucky", "t2_bot");

        assert_eq!(source.poll_once().await.unwrap(), 0);
        assert_eq!(store.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn new_items_are_dispatched_once_in_order() {
        let (service, store, platform) = make_service(0.5, RecordingPlatform::default());
        let feed = Arc::new(ScriptedFeed::default());
        let mut source = EventSource::new(Arc::clone(&feed), Arc::new(service), "lucky", "t2_bot");

        source.poll_once().await.unwrap();

        feed.posts.lock().unwrap().push(post("t3_a", "t2_alice", 20));
        feed.comments.lock().unwrap().push(comment("t1_b", "t2_bob", 10));

        assert_eq!(source.poll_once().await.unwrap(), 2);
        assert_eq!(source.poll_once().await.unwrap(), 0);

        let record = store.records.get("lucky").unwrap().value().clone();
        assert_eq!(record.get("alice"), Some(1));
        assert_eq!(record.get("bob"), Some(1));
        assert_eq!(platform.widget_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bot_replies_do_not_retrigger() {
        let (service, store, _) = make_service(0.999, RecordingPlatform::default());
        let feed = Arc::new(ScriptedFeed::default());
        let mut source = EventSource::new(Arc::clone(&feed), Arc::new(service), "lucky", "t2_bot");

        source.poll_once().await.unwrap();
        feed.comments.lock().unwrap().push(comment("t1_notice", "t2_bot", 5));

        assert_eq!(source.poll_once().await.unwrap(), 1);
        assert_eq!(store.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_bad_item_does_not_stop_the_rest() {
        let (service, store, _) = make_service(0.5, RecordingPlatform::default());
        let feed = Arc::new(ScriptedFeed::default());
        let mut source = EventSource::new(Arc::clone(&feed), Arc::new(service), "lucky", "t2_bot");

        source.poll_once().await.unwrap();

        let mut orphan = post("t3_deleted", "t2_ghost", 1);
        orphan.event.author = None;
        feed.posts.lock().unwrap().push(orphan);
        feed.comments.lock().unwrap().push(comment("t1_ok", "t2_alice", 2));

        assert_eq!(source.poll_once().await.unwrap(), 2);

        let record = store.records.get("lucky").unwrap().value().clone();
        assert_eq!(record.get("alice"), Some(1));
        assert_eq!(record.get("ghost"), None);
        assert_eq!(store.increments.load(Ordering::SeqCst), 1);
    }
}
