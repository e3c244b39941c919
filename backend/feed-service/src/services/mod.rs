//! Service layer for feed-service
//!
//! - fanout: queue consumer that pushes new posts into followers' feeds
//! - feed_update: the feed list algorithm shared by every feed store
//! - feed_reader: paged feed reads
//! - posts / subscriptions: API-facing CRUD with validation

pub mod fanout;
pub mod feed_reader;
pub mod feed_update;
pub mod posts;
pub mod subscriptions;

pub use fanout::{FanoutConfig, FanoutWorker, TaskOutcome};
pub use feed_reader::{FeedReader, FEED_PAGE_SIZE};
pub use feed_update::{prepend_post, FeedChange, MAX_FEED_LEN};
pub use posts::PostService;
pub use subscriptions::SubscriptionService;
