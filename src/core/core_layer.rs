// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "platform/platform_client.rs"]
pub mod platform;

#[path = "scores/score_service.rs"]
pub mod scores;

#[path = "leaderboard/leaderboard_service.rs"]
pub mod leaderboard;

#[path = "submissions/mod.rs"]
pub mod submissions;
