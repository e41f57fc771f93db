// Implementations of ScoreStore.

pub mod in_memory;
pub mod json_store;
pub mod sqlite_store;

pub use in_memory::InMemoryScoreStore;
pub use json_store::JsonScoreStore;
pub use sqlite_store::SqliteScoreStore;
