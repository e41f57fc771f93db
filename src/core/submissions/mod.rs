pub mod submission_events;
pub mod submission_feed;
pub mod submission_models;
pub mod submission_service;

pub use submission_events::{on_comment_submit, on_post_submit};
pub use submission_feed::{FeedItem, SubmissionFeed};
pub use submission_models::{Author, CommentSubmit, Community, ContentRef, PostSubmit};
pub use submission_service::{LuckRoll, SubmissionService, ThreadRngRoll};
