use crate::error::Result;
use crate::models::{User, UserId};
use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name FROM users WHERE id = $1")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}
