use crate::error::Result;
use crate::models::{Post, PostId, UserId};
use async_trait::async_trait;
use sqlx::PgPool;

/// Post storage. Every read hides soft-deleted posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, post_id: PostId) -> Result<Option<Post>>;

    async fn create_post(&self, creator: UserId, text: &str) -> Result<Post>;

    /// Change the text of a live post owned by `creator`. Returns whether a
    /// post matched.
    async fn update_post_text(&self, creator: UserId, post_id: PostId, text: &str) -> Result<bool>;

    /// Soft delete a live post owned by `creator`. Returns whether a post
    /// matched.
    async fn remove_post(&self, creator: UserId, post_id: PostId) -> Result<bool>;

    /// Posts of `creator`, newest first, strictly older than `before` when set
    async fn get_user_posts(
        &self,
        creator: UserId,
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>>;

    /// Posts among `ids`, newest first, strictly older than `before` when set
    async fn get_posts_by_ids(
        &self,
        ids: &[PostId],
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>>;
}

pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn get_post(&self, post_id: PostId) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, creator_id, created_at, text, removed
            FROM posts
            WHERE id = $1 AND removed = FALSE
            "#,
        )
        .bind(post_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn create_post(&self, creator: UserId, text: &str) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (creator_id, text)
            VALUES ($1, $2)
            RETURNING id, creator_id, created_at, text, removed
            "#,
        )
        .bind(creator.0)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn update_post_text(&self, creator: UserId, post_id: PostId, text: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET text = $1
            WHERE id = $2 AND creator_id = $3 AND removed = FALSE
            "#,
        )
        .bind(text)
        .bind(post_id.0)
        .bind(creator.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_post(&self, creator: UserId, post_id: PostId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET removed = TRUE
            WHERE id = $1 AND creator_id = $2 AND removed = FALSE
            "#,
        )
        .bind(post_id.0)
        .bind(creator.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_user_posts(
        &self,
        creator: UserId,
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, creator_id, created_at, text, removed
            FROM posts
            WHERE creator_id = $1
              AND removed = FALSE
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(creator.0)
        .bind(before.map(|id| id.0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn get_posts_by_ids(
        &self,
        ids: &[PostId],
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, creator_id, created_at, text, removed
            FROM posts
            WHERE id = ANY($1)
              AND removed = FALSE
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(&raw_ids)
        .bind(before.map(|id| id.0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
