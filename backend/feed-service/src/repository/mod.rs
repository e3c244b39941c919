//! Storage seams.
//!
//! Each store is a trait so the worker, the read path and the HTTP layer can
//! run against PostgreSQL in production and the in-memory versions in tests.

pub mod feeds;
pub mod memory;
pub mod posts;
pub mod subscriptions;
pub mod users;

pub use feeds::{FeedStore, PgFeedStore};
pub use memory::{InMemoryFeedStore, InMemoryPostStore, InMemorySubscriptionStore, InMemoryUserStore};
pub use posts::{PgPostStore, PostStore};
pub use subscriptions::{PgSubscriptionStore, SubscriptionStore};
pub use users::{PgUserStore, UserStore};
