// Reddit layer - turns subreddit activity into calls to the core entry points.

pub mod event_source;

pub use event_source::EventSource;
