use crate::error::Result;
use crate::models::{PostId, UserId};
use crate::services::feed_update::{prepend_post, FeedChange};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

/// Materialized per-user feeds.
///
/// `add_post` must be atomic per user: two concurrent calls for the same
/// user may not lose either update.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Stored post ids, newest first. Empty when the user has no feed yet.
    async fn get_feed(&self, user_id: UserId) -> Result<Vec<PostId>>;

    /// Apply [`prepend_post`] to the user's feed and persist the result.
    async fn add_post(&self, user_id: UserId, post_id: PostId, max_len: usize)
        -> Result<FeedChange>;
}

pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn get_feed(&self, user_id: UserId) -> Result<Vec<PostId>> {
        let row: Option<(Vec<i64>,)> =
            sqlx::query_as("SELECT post_ids FROM user_feeds WHERE user_id = $1")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|(ids,)| ids.into_iter().map(PostId).collect())
            .unwrap_or_default())
    }

    async fn add_post(
        &self,
        user_id: UserId,
        post_id: PostId,
        max_len: usize,
    ) -> Result<FeedChange> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_feeds (user_id, post_ids)
            VALUES ($1, '{}')
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.0)
        .execute(&mut *tx)
        .await?;

        // Row lock serializes writers for this user until commit
        let (stored,): (Vec<i64>,) =
            sqlx::query_as("SELECT post_ids FROM user_feeds WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.0)
                .fetch_one(&mut *tx)
                .await?;

        let mut feed: Vec<PostId> = stored.into_iter().map(PostId).collect();
        let change = prepend_post(&mut feed, post_id, max_len);

        if change.is_changed() {
            let updated: Vec<i64> = feed.iter().map(|id| id.0).collect();
            sqlx::query(
                "UPDATE user_feeds SET post_ids = $2, updated_at = NOW() WHERE user_id = $1",
            )
            .bind(user_id.0)
            .bind(&updated)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            user_id = %user_id,
            post_id = %post_id,
            change = change.as_str(),
            "Feed updated"
        );
        Ok(change)
    }
}
