//! HTTP API end to end against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use feed_service::handlers::{self, AppState, USER_ID_HEADER};
use feed_service::models::UserId;
use feed_service::repository::{
    InMemoryFeedStore, InMemoryPostStore, InMemorySubscriptionStore, InMemoryUserStore,
};
use feed_service::services::{FanoutConfig, FanoutWorker, TaskOutcome};
use task_queue::InMemoryTaskQueue;

struct Backend {
    users: Arc<InMemoryUserStore>,
    posts: Arc<InMemoryPostStore>,
    subscriptions: Arc<InMemorySubscriptionStore>,
    feeds: Arc<InMemoryFeedStore>,
    queue: Arc<InMemoryTaskQueue>,
}

impl Backend {
    fn new() -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        users.insert_user(UserId(1), "alice");
        users.insert_user(UserId(2), "bob");
        users.insert_user(UserId(3), "carol");
        Self {
            users,
            posts: Arc::new(InMemoryPostStore::new()),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            feeds: Arc::new(InMemoryFeedStore::new()),
            queue: Arc::new(InMemoryTaskQueue::new(
                Duration::from_secs(30),
                Duration::from_millis(10),
            )),
        }
    }

    fn state(&self) -> web::Data<AppState> {
        web::Data::new(AppState::new(
            self.users.clone(),
            self.posts.clone(),
            self.subscriptions.clone(),
            self.feeds.clone(),
            self.queue.clone(),
        ))
    }

    fn worker(&self) -> FanoutWorker {
        FanoutWorker::new(
            self.queue.clone(),
            self.posts.clone(),
            self.subscriptions.clone(),
            self.feeds.clone(),
            FanoutConfig::default(),
        )
    }
}

macro_rules! init_app {
    ($backend:expr) => {
        test::init_service(
            App::new()
                .app_data($backend.state())
                .configure(handlers::configure)
                .default_service(web::route().to(handlers::unknown_method)),
        )
        .await
    };
}

fn call(method: &str, user: Option<i64>, body: Value) -> test::TestRequest {
    let mut req = test::TestRequest::post()
        .uri(&format!("/api/{}", method))
        .insert_header(("Content-Type", "application/json; charset=utf-8"))
        .set_payload(body.to_string());
    if let Some(user) = user {
        req = req.insert_header((USER_ID_HEADER, user.to_string()));
    }
    req
}

#[actix_web::test]
async fn missing_or_unknown_user_is_unauthorized() {
    let backend = Backend::new();
    let app = init_app!(backend);

    for user in [None, Some(0), Some(42)] {
        let resp = test::call_service(&app, call("get_my_feed", user, json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error_code"], 401);
    }
}

#[actix_web::test]
async fn create_then_get_post() {
    let backend = Backend::new();
    let app = init_app!(backend);

    let resp = test::call_service(
        &app,
        call("create_post", Some(1), json!({"text": "first!"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["ok"], true);
    let post_id = body["data"]["post_id"].as_i64().unwrap();

    let resp = test::call_service(
        &app,
        call("get_post", Some(2), json!({"post_id": post_id})).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["post"]["text"], "first!");
    assert_eq!(body["data"]["post"]["creator_id"], 1);
    assert!(body["data"]["post"].get("removed").is_none());

    // The new post is waiting for fan-out
    assert_eq!(backend.queue.pending_len().await, 1);
}

#[actix_web::test]
async fn validation_errors_are_bad_requests() {
    let backend = Backend::new();
    let app = init_app!(backend);

    let cases = [
        ("create_post", json!({"text": ""})),
        ("get_post", json!({"post_id": 0})),
        ("get_post", json!({"post_id": 12345})),
        ("update_post", json!({"post_id": 1})),
        ("delete_post", json!({})),
        ("subscribe", json!({"user_id": 1})),
        ("subscribe", json!({"user_id": 99})),
        ("unsubscribe", json!({"user_id": 0})),
    ];

    for (method, body) in cases {
        let resp = test::call_service(&app, call(method, Some(1), body.clone()).to_request()).await;
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "{} with {}",
            method,
            body
        );
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["error_code"], 400);
    }
}

#[actix_web::test]
async fn malformed_json_and_unknown_method_are_bad_requests() {
    let backend = Backend::new();
    let app = init_app!(backend);

    let req = test::TestRequest::post()
        .uri("/api/create_post")
        .insert_header(("Content-Type", "application/json; charset=utf-8"))
        .insert_header((USER_ID_HEADER, "1"))
        .set_payload("{\"text\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, call("no_such_method", Some(1), json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn non_json_content_type_is_bad_request() {
    let backend = Backend::new();
    let app = init_app!(backend);

    for content_type in [None, Some("text/plain"), Some("application/json; charset=latin1")] {
        let mut req = test::TestRequest::post()
            .uri("/api/create_post")
            .insert_header((USER_ID_HEADER, "1"))
            .set_payload(json!({"text": "hi"}).to_string());
        if let Some(content_type) = content_type {
            req = req.insert_header(("Content-Type", content_type));
        }

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{:?}", content_type);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error_code"], 400);
    }

    assert_eq!(backend.queue.pending_len().await, 0);
}

#[actix_web::test]
async fn only_the_creator_edits_and_deletes() {
    let backend = Backend::new();
    let app = init_app!(backend);

    let resp = test::call_service(
        &app,
        call("create_post", Some(1), json!({"text": "v1"})).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let post_id = body["data"]["post_id"].as_i64().unwrap();

    let resp = test::call_service(
        &app,
        call("update_post", Some(2), json!({"post_id": post_id, "text": "hijack"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        call("update_post", Some(1), json!({"post_id": post_id, "text": "v2"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"ok": true, "data": null}));

    let resp = test::call_service(
        &app,
        call("delete_post", Some(1), json!({"post_id": post_id})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        call("get_post", Some(1), json!({"post_id": post_id})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn subscribe_fan_out_and_read_feed() {
    let backend = Backend::new();
    let app = init_app!(backend);
    let worker = backend.worker();

    for follower in [2, 3] {
        let resp = test::call_service(
            &app,
            call("subscribe", Some(follower), json!({"user_id": 1})).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    // Subscribing twice is fine
    let resp = test::call_service(
        &app,
        call("subscribe", Some(2), json!({"user_id": 1})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut created = Vec::new();
    for text in ["one", "two"] {
        let resp = test::call_service(
            &app,
            call("create_post", Some(1), json!({"text": text})).to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        created.push(body["data"]["post_id"].as_i64().unwrap());
    }

    for _ in 0..2 {
        let outcome = worker.run_once().await.unwrap();
        assert!(matches!(
            outcome,
            Some(TaskOutcome::Delivered { followers: 2, .. })
        ));
    }

    let resp = test::call_service(&app, call("get_my_feed", Some(2), json!({})).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    let ids: Vec<i64> = body["data"]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![created[1], created[0]]);

    // Cursor skips everything at or above the given id
    let resp = test::call_service(
        &app,
        call("get_my_feed", Some(3), json!({"last_post_id": created[1]})).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);

    // Removed posts disappear from feeds at read time
    test::call_service(
        &app,
        call("delete_post", Some(1), json!({"post_id": created[1]})).to_request(),
    )
    .await;
    let resp = test::call_service(&app, call("get_my_feed", Some(2), json!({})).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);

    // The author's own feed is empty: nobody they follow has posted
    let resp = test::call_service(&app, call("get_my_feed", Some(1), json!({})).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["posts"], json!([]));
}

#[actix_web::test]
async fn user_posts_default_to_caller() {
    let backend = Backend::new();
    let app = init_app!(backend);

    for (user, text) in [(1, "a1"), (2, "b1"), (1, "a2")] {
        test::call_service(
            &app,
            call("create_post", Some(user), json!({"text": text})).to_request(),
        )
        .await;
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/get_user_posts")
            .insert_header(("Content-Type", "application/json; charset=utf-8"))
            .insert_header((USER_ID_HEADER, "1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let texts: Vec<&str> = body["data"]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["a2", "a1"]);

    let resp = test::call_service(
        &app,
        call("get_user_posts", Some(1), json!({"user_id": 2})).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["posts"][0]["text"], "b1");
}

#[actix_web::test]
async fn health_and_metrics_routes() {
    let backend = Backend::new();
    let app = init_app!(backend);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
