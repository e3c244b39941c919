//! In-memory stores used by tests and local runs without PostgreSQL.

use super::{FeedStore, PostStore, SubscriptionStore, UserStore};
use crate::error::{AppError, Result};
use crate::models::{Post, PostId, User, UserId};
use crate::services::feed_update::{prepend_post, FeedChange};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<i64, User>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user_id: UserId, name: &str) {
        self.users.insert(
            user_id.0,
            User {
                id: user_id.0,
                name: name.to_string(),
            },
        );
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&user_id.0).map(|u| u.value().clone()))
    }
}

#[derive(Default)]
pub struct InMemoryPostStore {
    posts: DashMap<i64, Post>,
    last_id: AtomicI64,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a post with a fixed id. Later `create_post` ids continue after it.
    pub fn insert_post(&self, post_id: PostId, creator: UserId, text: &str) {
        self.last_id.fetch_max(post_id.0, Ordering::SeqCst);
        self.posts.insert(
            post_id.0,
            Post {
                id: post_id.0,
                creator_id: creator.0,
                created_at: Utc::now(),
                text: text.to_string(),
                removed: false,
            },
        );
    }

    fn newest_first(
        &self,
        filter: impl Fn(&Post) -> bool,
        before: Option<PostId>,
        limit: i64,
    ) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| !p.removed && filter(p.value()))
            .filter(|p| before.map_or(true, |b| p.id < b.0))
            .map(|p| p.value().clone())
            .collect();
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        posts.truncate(limit.max(0) as usize);
        posts
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn get_post(&self, post_id: PostId) -> Result<Option<Post>> {
        Ok(self
            .posts
            .get(&post_id.0)
            .filter(|p| !p.removed)
            .map(|p| p.value().clone()))
    }

    async fn create_post(&self, creator: UserId, text: &str) -> Result<Post> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let post = Post {
            id,
            creator_id: creator.0,
            created_at: Utc::now(),
            text: text.to_string(),
            removed: false,
        };
        self.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn update_post_text(&self, creator: UserId, post_id: PostId, text: &str) -> Result<bool> {
        match self.posts.get_mut(&post_id.0) {
            Some(mut post) if post.creator_id == creator.0 && !post.removed => {
                post.text = text.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_post(&self, creator: UserId, post_id: PostId) -> Result<bool> {
        match self.posts.get_mut(&post_id.0) {
            Some(mut post) if post.creator_id == creator.0 && !post.removed => {
                post.removed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_user_posts(
        &self,
        creator: UserId,
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        Ok(self.newest_first(|p| p.creator_id == creator.0, before, limit))
    }

    async fn get_posts_by_ids(
        &self,
        ids: &[PostId],
        before: Option<PostId>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        Ok(self.newest_first(|p| ids.contains(&PostId(p.id)), before, limit))
    }
}

/// Edges indexed by the followed user
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    followers: DashMap<i64, BTreeSet<i64>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_followers(&self, author: UserId) -> Result<Vec<UserId>> {
        Ok(self
            .followers
            .get(&author.0)
            .map(|set| set.iter().copied().map(UserId).collect())
            .unwrap_or_default())
    }

    async fn subscribe(&self, src: UserId, dst: UserId) -> Result<bool> {
        Ok(self.followers.entry(dst.0).or_default().insert(src.0))
    }

    async fn unsubscribe(&self, src: UserId, dst: UserId) -> Result<bool> {
        Ok(self
            .followers
            .get_mut(&dst.0)
            .map(|mut set| set.remove(&src.0))
            .unwrap_or(false))
    }
}

/// Feeds keyed by user id.
///
/// `add_post` runs under the map's entry guard, so updates to one user are
/// serialized while other users proceed in parallel. Failures can be injected
/// per user to exercise retry paths.
#[derive(Default)]
pub struct InMemoryFeedStore {
    feeds: DashMap<i64, Vec<PostId>>,
    failures: DashMap<i64, usize>,
    add_post_calls: AtomicUsize,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user_id: UserId, post_ids: &[i64]) {
        self.feeds
            .insert(user_id.0, post_ids.iter().copied().map(PostId).collect());
    }

    /// Make the next `times` calls to `add_post` for `user_id` fail
    pub fn fail_next(&self, user_id: UserId, times: usize) {
        self.failures.insert(user_id.0, times);
    }

    /// Number of `add_post` calls, failed ones included
    pub fn add_post_calls(&self) -> usize {
        self.add_post_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self, user_id: UserId) -> bool {
        match self.failures.get_mut(&user_id.0) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn get_feed(&self, user_id: UserId) -> Result<Vec<PostId>> {
        Ok(self
            .feeds
            .get(&user_id.0)
            .map(|feed| feed.value().clone())
            .unwrap_or_default())
    }

    async fn add_post(
        &self,
        user_id: UserId,
        post_id: PostId,
        max_len: usize,
    ) -> Result<FeedChange> {
        self.add_post_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure(user_id) {
            return Err(AppError::Internal(format!(
                "injected feed store failure for user {}",
                user_id
            )));
        }

        let mut feed = self.feeds.entry(user_id.0).or_default();
        Ok(prepend_post(feed.value_mut(), post_id, max_len))
    }
}
