pub mod backoff;
pub mod bluesky;
pub mod fetch;
pub mod normalize;
pub mod pacing;
pub mod query;
pub mod reddit;
pub mod twitter;
pub mod walker;

pub use backoff::*;
pub use bluesky::BlueskyClient;
pub use fetch::*;
pub use pacing::*;
pub use query::*;
pub use reddit::RedditClient;
pub use twitter::TwitterClient;
pub use walker::*;
