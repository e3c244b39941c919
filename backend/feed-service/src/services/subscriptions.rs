use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, Result};
use crate::models::UserId;
use crate::repository::{SubscriptionStore, UserStore};

#[derive(Clone)]
pub struct SubscriptionService {
    users: Arc<dyn UserStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl SubscriptionService {
    pub fn new(users: Arc<dyn UserStore>, subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            users,
            subscriptions,
        }
    }

    async fn validate_target(&self, user: UserId, target: UserId) -> Result<()> {
        if !target.is_valid() {
            return Err(AppError::bad_request("user_id must be a positive integer"));
        }
        if user == target {
            return Err(AppError::bad_request("cannot subscribe to yourself"));
        }
        if self.users.get_user(target).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", target)));
        }
        Ok(())
    }

    /// Follow `target`. Following someone twice is not an error.
    pub async fn subscribe(&self, user: UserId, target: UserId) -> Result<bool> {
        self.validate_target(user, target).await?;

        let created = self.subscriptions.subscribe(user, target).await?;
        info!(follower = %user, followee = %target, created, "Subscribed");
        Ok(created)
    }

    /// Stop following `target`. Existing feed entries from `target` stay.
    pub async fn unsubscribe(&self, user: UserId, target: UserId) -> Result<bool> {
        self.validate_target(user, target).await?;

        let removed = self.subscriptions.unsubscribe(user, target).await?;
        info!(follower = %user, followee = %target, removed, "Unsubscribed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemorySubscriptionStore, InMemoryUserStore};

    fn service() -> (SubscriptionService, Arc<InMemorySubscriptionStore>) {
        let users = Arc::new(InMemoryUserStore::new());
        users.insert_user(UserId(1), "alice");
        users.insert_user(UserId(2), "bob");
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        (
            SubscriptionService::new(users, subscriptions.clone()),
            subscriptions,
        )
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_success() {
        let (svc, store) = service();
        assert!(svc.subscribe(UserId(2), UserId(1)).await.unwrap());
        assert!(!svc.subscribe(UserId(2), UserId(1)).await.unwrap());
        assert_eq!(store.get_followers(UserId(1)).await.unwrap(), vec![UserId(2)]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_targets() {
        let (svc, _) = service();
        for target in [UserId(0), UserId(-3), UserId(2), UserId(99)] {
            assert!(
                svc.subscribe(UserId(2), target).await.is_err(),
                "accepted target {}",
                target
            );
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_missing_edge_is_success() {
        let (svc, store) = service();
        assert!(!svc.unsubscribe(UserId(2), UserId(1)).await.unwrap());

        svc.subscribe(UserId(2), UserId(1)).await.unwrap();
        assert!(svc.unsubscribe(UserId(2), UserId(1)).await.unwrap());
        assert!(store.get_followers(UserId(1)).await.unwrap().is_empty());
    }
}
