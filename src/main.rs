// This is the entry point of the lucky bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (stores, Reddit API)
// - `reddit/` = Reddit-specific adapters (the polling event source)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Start one event source per subreddit
// 4. Stop cleanly on Ctrl-C

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a handful of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "reddit/reddit_layer.rs"]
mod reddit;

mod config;

use crate::config::{BotConfig, StoreBackend};
use crate::core::scores::ScoreStore;
use crate::core::submissions::{SubmissionService, ThreadRngRoll};
use crate::infra::reddit::RedditApiClient;
use crate::infra::scores::{InMemoryScoreStore, JsonScoreStore, SqliteScoreStore};
use crate::reddit::EventSource;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;

async fn open_store(backend: &StoreBackend) -> anyhow::Result<Arc<dyn ScoreStore>> {
    let store: Arc<dyn ScoreStore> = match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory score store; scores are lost on restart");
            Arc::new(InMemoryScoreStore::new())
        }
        StoreBackend::Json(path) => Arc::new(
            JsonScoreStore::new(path.clone())
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        StoreBackend::Sqlite(path) => {
            let url = path.to_str().context("SQLite path is not valid UTF-8")?;
            Arc::new(SqliteScoreStore::new(url).await?)
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = open_store(&config.store).await?;
    tracing::info!(backend = ?config.store, "Score store ready");

    let reddit = Arc::new(RedditApiClient::new(config.credentials.clone())?);

    // Whoever we are logged in as is who we must never react to.
    let me = reddit.me().await.context("Failed to resolve the bot account")?;
    tracing::info!(account = %me.name, id = %me.id, "Logged in to Reddit");

    let service = Arc::new(SubmissionService::new(
        Arc::clone(&store),
        Arc::clone(&reddit),
        ThreadRngRoll,
    ));

    // ========================================================================
    // EVENT SOURCES
    // ========================================================================

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    for subreddit in &config.subreddits {
        let source = EventSource::new(
            Arc::clone(&reddit),
            Arc::clone(&service),
            subreddit.clone(),
            me.id.clone(),
        );
        handles.push(tokio::spawn(
            source.run(config.poll_interval, shutdown_rx.clone()),
        ));
    }

    println!("🍀 Lucky bot is watching {} subreddit(s)", config.subreddits.len());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    shutdown_tx.send(true).ok();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Event source task failed: {}", e);
        }
    }

    Ok(())
}
