use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{Post, PostId, UserId};
use crate::repository::{FeedStore, PostStore};

/// Posts per feed page
pub const FEED_PAGE_SIZE: i64 = 50;

/// Read side of the materialized feed.
///
/// The feed only stores post ids; posts are resolved at read time so edits
/// and soft deletes show up without touching any feed.
#[derive(Clone)]
pub struct FeedReader {
    feeds: Arc<dyn FeedStore>,
    posts: Arc<dyn PostStore>,
    page_size: i64,
}

impl FeedReader {
    pub fn new(feeds: Arc<dyn FeedStore>, posts: Arc<dyn PostStore>) -> Self {
        Self {
            feeds,
            posts,
            page_size: FEED_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// One page of the user's feed, newest first.
    ///
    /// `last_post_id` is the cursor from the previous page; a non-positive
    /// value starts from the top.
    pub async fn get_feed_page(&self, user_id: UserId, last_post_id: PostId) -> Result<Vec<Post>> {
        let post_ids = self.feeds.get_feed(user_id).await?;
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let before = last_post_id.is_valid().then_some(last_post_id);
        let posts = self
            .posts
            .get_posts_by_ids(&post_ids, before, self.page_size)
            .await?;

        debug!(
            user_id = %user_id,
            stored = post_ids.len(),
            returned = posts.len(),
            "Feed page read"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryFeedStore, InMemoryPostStore};

    fn reader(feeds: Arc<InMemoryFeedStore>, posts: Arc<InMemoryPostStore>) -> FeedReader {
        FeedReader::new(feeds, posts)
    }

    fn ids(posts: &[Post]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_empty_feed() {
        let feeds = Arc::new(InMemoryFeedStore::new());
        let posts = Arc::new(InMemoryPostStore::new());
        let page = reader(feeds, posts)
            .get_feed_page(UserId(1), PostId(0))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_pages_follow_cursor_and_hide_removed() {
        let feeds = Arc::new(InMemoryFeedStore::new());
        let posts = Arc::new(InMemoryPostStore::new());
        for id in 1..=5 {
            posts.insert_post(PostId(id), UserId(9), "p");
        }
        // Post 6 exists but never reached this feed
        posts.insert_post(PostId(6), UserId(9), "p");
        feeds.seed(UserId(1), &[5, 4, 3, 2, 1]);
        posts.remove_post(UserId(9), PostId(4)).await.unwrap();

        let reader = reader(feeds, posts).with_page_size(2);

        let first = reader.get_feed_page(UserId(1), PostId(0)).await.unwrap();
        assert_eq!(ids(&first), vec![5, 3]);

        let second = reader.get_feed_page(UserId(1), PostId(3)).await.unwrap();
        assert_eq!(ids(&second), vec![2, 1]);

        let third = reader.get_feed_page(UserId(1), PostId(1)).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_default_page_size() {
        let feeds = Arc::new(InMemoryFeedStore::new());
        let posts = Arc::new(InMemoryPostStore::new());
        let stored: Vec<i64> = (1..=60).rev().collect();
        for id in &stored {
            posts.insert_post(PostId(*id), UserId(9), "p");
        }
        feeds.seed(UserId(1), &stored);

        let page = reader(feeds, posts)
            .get_feed_page(UserId(1), PostId(0))
            .await
            .unwrap();
        assert_eq!(page.len(), FEED_PAGE_SIZE as usize);
        assert_eq!(page[0].id, 60);
    }
}
