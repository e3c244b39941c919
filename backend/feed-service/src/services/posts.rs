use std::sync::Arc;

use task_queue::TaskQueue;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::models::{NewPostEvent, Post, PostId, UserId};
use crate::repository::PostStore;
use crate::services::feed_reader::FEED_PAGE_SIZE;

/// Post operations behind the HTTP API.
///
/// Creating a post also announces it on the new-post queue so the fan-out
/// worker can push it into followers' feeds.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostStore>,
    queue: Arc<dyn TaskQueue>,
}

fn require_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    Ok(())
}

fn require_post_id(post_id: PostId) -> Result<()> {
    if !post_id.is_valid() {
        return Err(AppError::bad_request("post_id must be a positive integer"));
    }
    Ok(())
}

impl PostService {
    pub fn new(posts: Arc<dyn PostStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { posts, queue }
    }

    /// Store the post, then enqueue its fan-out.
    ///
    /// Insert and enqueue are separate steps. If the enqueue fails the post
    /// stays but reaches no feed, and the caller gets the queue error.
    pub async fn create_post(&self, creator: UserId, text: &str) -> Result<Post> {
        require_text(text)?;

        let post = self.posts.create_post(creator, text).await?;
        let event = NewPostEvent::new(post.post_id());

        match self.queue.put(&event.encode()).await {
            Ok(task_id) => {
                info!(post_id = %post.id, author = %creator, task_id = %task_id, "Post created");
                Ok(post)
            }
            Err(e) => {
                error!(
                    post_id = %post.id,
                    error = %e,
                    "Post stored but fan-out could not be enqueued"
                );
                Err(e.into())
            }
        }
    }

    pub async fn get_post(&self, post_id: PostId) -> Result<Post> {
        require_post_id(post_id)?;
        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    pub async fn get_user_posts(&self, creator: UserId, last_post_id: PostId) -> Result<Vec<Post>> {
        let before = last_post_id.is_valid().then_some(last_post_id);
        self.posts
            .get_user_posts(creator, before, FEED_PAGE_SIZE)
            .await
    }

    pub async fn update_post(&self, creator: UserId, post_id: PostId, text: &str) -> Result<()> {
        require_post_id(post_id)?;
        require_text(text)?;

        if !self.posts.update_post_text(creator, post_id, text).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        info!(post_id = %post_id, author = %creator, "Post updated");
        Ok(())
    }

    /// Soft delete. Feeds keep the id; the read path skips removed posts.
    pub async fn delete_post(&self, creator: UserId, post_id: PostId) -> Result<()> {
        require_post_id(post_id)?;

        if !self.posts.remove_post(creator, post_id).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        info!(post_id = %post_id, author = %creator, "Post removed");
        Ok(())
    }
}
