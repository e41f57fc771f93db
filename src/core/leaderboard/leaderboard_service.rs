// Leaderboard rendering and publishing.
//
// Rendering is pure (record in, markdown table out). Publishing talks to the
// platform port to swap the sidebar widget.

use crate::core::platform::{
    NewWidget, PlatformError, RedditPlatform, RequestContext, Widget, WidgetStyles,
};
use crate::core::scores::{ScoreError, ScoreRecord, ScoreStore};
use futures_util::future::join_all;
use thiserror::Error;

/// Short name of the widget the bot owns. Anything with this name is replaced.
pub const LEADERBOARD_WIDGET_NAME: &str = "luckyboards";

/// How many users the table shows.
pub const LEADERBOARD_SIZE: usize = 10;

const WIDGET_KIND: &str = "textarea";
const BACKGROUND_COLOR: &str = "#ff66ac";
const HEADER_COLOR: &str = "#5a74cc";

const TABLE_HEADER: &str = "||Username|Score|";
const TABLE_ALIGNMENT: &str = "|:--|:--|--:|";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub score: u64,
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Highest scores first, at most `limit` of them.
///
/// The sort is stable, so equal scores keep the record's own order.
pub fn top_entries(record: &ScoreRecord, limit: usize) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<(&str, u64)> = record.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(limit);

    sorted
        .into_iter()
        .enumerate()
        .map(|(index, (username, score))| LeaderboardEntry {
            rank: index + 1,
            username: username.to_string(),
            score,
        })
        .collect()
}

/// Render entries as a Reddit markdown table.
pub fn render_table(entries: &[LeaderboardEntry]) -> String {
    let body = entries
        .iter()
        .map(|e| format!("|{}|{}|{}|", e.rank, e.username, e.score))
        .collect::<Vec<_>>()
        .join("\n");

    [TABLE_HEADER, TABLE_ALIGNMENT, &body].join("\n")
}

pub struct LeaderboardService<S: ScoreStore, P: RedditPlatform> {
    store: S,
    platform: P,
}

impl<S: ScoreStore, P: RedditPlatform> LeaderboardService<S, P> {
    pub fn new(store: S, platform: P) -> Self {
        Self { store, platform }
    }

    /// Top entries for a subreddit.
    pub async fn entries(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<LeaderboardEntry>, ScoreError> {
        let record = self.store.load(subreddit, ctx).await?;
        Ok(top_entries(&record, LEADERBOARD_SIZE))
    }

    /// The leaderboard table text for a subreddit.
    pub async fn render(&self, subreddit: &str, ctx: &RequestContext) -> Result<String, ScoreError> {
        Ok(render_table(&self.entries(subreddit, ctx).await?))
    }

    /// Replace the subreddit's leaderboard widget with a fresh one.
    ///
    /// Deletes first, then creates. If creation fails the subreddit is left
    /// without a leaderboard until the next successful publish.
    pub async fn publish(
        &self,
        subreddit: &str,
        ctx: &RequestContext,
    ) -> Result<Widget, LeaderboardError> {
        let widgets = self.platform.get_widgets(subreddit, ctx).await?;

        let stale: Vec<&Widget> = widgets
            .iter()
            .filter(|w| w.short_name == LEADERBOARD_WIDGET_NAME)
            .collect();

        // Let every deletion finish before reporting the first failure.
        join_all(
            stale
                .iter()
                .map(|w| self.platform.delete_widget(subreddit, &w.id, ctx)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<()>, _>>()?;

        let text = self.render(subreddit, ctx).await?;

        let widget = self
            .platform
            .add_widget(
                &NewWidget {
                    kind: WIDGET_KIND.to_string(),
                    short_name: LEADERBOARD_WIDGET_NAME.to_string(),
                    subreddit: subreddit.to_string(),
                    text,
                    styles: WidgetStyles {
                        background_color: BACKGROUND_COLOR.to_string(),
                        header_color: HEADER_COLOR.to_string(),
                    },
                },
                ctx,
            )
            .await?;

        tracing::info!(
            subreddit,
            replaced = stale.len(),
            widget_id = %widget.id,
            "Leaderboard published"
        );

        Ok(widget)
    }
}
