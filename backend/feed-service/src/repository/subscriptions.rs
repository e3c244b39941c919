use crate::error::Result;
use crate::models::UserId;
use async_trait::async_trait;
use sqlx::PgPool;

/// Directed follow edges: `src` follows `dst`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Everyone who follows `author`, in ascending id order
    async fn get_followers(&self, author: UserId) -> Result<Vec<UserId>>;

    /// Insert-if-absent. Returns `true` when a new edge was created.
    async fn subscribe(&self, src: UserId, dst: UserId) -> Result<bool>;

    /// Returns `true` when an edge was removed.
    async fn unsubscribe(&self, src: UserId, dst: UserId) -> Result<bool>;
}

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn get_followers(&self, author: UserId) -> Result<Vec<UserId>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT src_id FROM followers WHERE dst_id = $1 ORDER BY src_id")
                .bind(author.0)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }

    async fn subscribe(&self, src: UserId, dst: UserId) -> Result<bool> {
        // RETURNING yields no row when the edge already exists
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO followers (src_id, dst_id)
            VALUES ($1, $2)
            ON CONFLICT (src_id, dst_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(src.0)
        .bind(dst.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn unsubscribe(&self, src: UserId, dst: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM followers WHERE src_id = $1 AND dst_id = $2")
            .bind(src.0)
            .bind(dst.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
