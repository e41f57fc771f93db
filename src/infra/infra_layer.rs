// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "scores/score_stores.rs"]
pub mod scores;

#[path = "reddit/mod.rs"]
pub mod reddit;
