// Reddit infra layer.
// - `reddit_client.rs` talks to the Reddit OAuth API and implements both the
//   platform port and the submission feed.

#[path = "reddit_client.rs"]
pub mod reddit_client;

pub use reddit_client::{RedditApiClient, RedditCredentials};
