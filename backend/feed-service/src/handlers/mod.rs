use std::sync::Arc;

use actix_web::{web, HttpResponse};
use task_queue::TaskQueue;

use crate::error::AppError;
use crate::metrics;
use crate::repository::{FeedStore, PostStore, SubscriptionStore, UserStore};
use crate::services::{FeedReader, PostService, SubscriptionService};

pub mod api;
pub mod auth;
pub mod content_type;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};
pub use content_type::JsonContentType;

/// Shared state of the HTTP API
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub posts: PostService,
    pub subscriptions: SubscriptionService,
    pub feed_reader: FeedReader,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        posts: Arc<dyn PostStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        feeds: Arc<dyn FeedStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            posts: PostService::new(posts.clone(), queue),
            subscriptions: SubscriptionService::new(users.clone(), subscriptions),
            feed_reader: FeedReader::new(feeds, posts),
            users,
        }
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Liveness and metrics routes, shared by both binaries
pub fn configure_ops(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}

/// Full API route table
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(api::create_post)
        .service(api::get_post)
        .service(api::get_user_posts)
        .service(api::update_post)
        .service(api::delete_post)
        .service(api::subscribe)
        .service(api::unsubscribe)
        .service(api::get_my_feed)
        .configure(configure_ops);
}

/// Fallback for paths outside the route table
pub async fn unknown_method() -> Result<HttpResponse, AppError> {
    Err(AppError::bad_request("unknown API method"))
}
