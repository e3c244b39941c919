//! JSON API. Every method is `POST /api/<method>` with a JSON
//! `Content-Type`; an empty body counts as `{}`.

use actix_web::{post, web, HttpResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::auth::AuthenticatedUser;
use super::content_type::JsonContentType;
use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{Post, PostId, UserId};

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse { ok: true, data })
}

fn parse_body<T: DeserializeOwned + Default>(body: &web::Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid JSON body: {}", e)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostIdRequest {
    pub post_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserPostsRequest {
    /// Whose posts; the caller's own when absent
    pub user_id: Option<i64>,
    pub last_post_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePostRequest {
    pub post_id: i64,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TargetUserRequest {
    pub user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedRequest {
    pub last_post_id: i64,
}

#[derive(Debug, Serialize)]
struct CreatedPost {
    post_id: i64,
}

#[derive(Debug, Serialize)]
struct PostEnvelope {
    post: Post,
}

#[derive(Debug, Serialize)]
struct PostList {
    posts: Vec<Post>,
}

#[post("/api/create_post")]
pub async fn create_post(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: CreatePostRequest = parse_body(&body)?;
    let post = state.posts.create_post(user.id(), &req.text).await?;
    Ok(ok(CreatedPost { post_id: post.id }))
}

#[post("/api/get_post")]
pub async fn get_post(
    _json: JsonContentType,
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: PostIdRequest = parse_body(&body)?;
    let post = state.posts.get_post(PostId(req.post_id)).await?;
    Ok(ok(PostEnvelope { post }))
}

#[post("/api/get_user_posts")]
pub async fn get_user_posts(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: UserPostsRequest = parse_body(&body)?;
    let creator = req.user_id.map(UserId).unwrap_or_else(|| user.id());
    let posts = state
        .posts
        .get_user_posts(creator, PostId(req.last_post_id))
        .await?;
    Ok(ok(PostList { posts }))
}

#[post("/api/update_post")]
pub async fn update_post(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: UpdatePostRequest = parse_body(&body)?;
    state
        .posts
        .update_post(user.id(), PostId(req.post_id), &req.text)
        .await?;
    Ok(ok(()))
}

#[post("/api/delete_post")]
pub async fn delete_post(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: PostIdRequest = parse_body(&body)?;
    state
        .posts
        .delete_post(user.id(), PostId(req.post_id))
        .await?;
    Ok(ok(()))
}

#[post("/api/subscribe")]
pub async fn subscribe(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: TargetUserRequest = parse_body(&body)?;
    state
        .subscriptions
        .subscribe(user.id(), UserId(req.user_id))
        .await?;
    Ok(ok(()))
}

#[post("/api/unsubscribe")]
pub async fn unsubscribe(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: TargetUserRequest = parse_body(&body)?;
    state
        .subscriptions
        .unsubscribe(user.id(), UserId(req.user_id))
        .await?;
    Ok(ok(()))
}

#[post("/api/get_my_feed")]
pub async fn get_my_feed(
    _json: JsonContentType,
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let req: FeedRequest = parse_body(&body)?;
    let posts = state
        .feed_reader
        .get_feed_page(user.id(), PostId(req.last_post_id))
        .await?;
    Ok(ok(PostList { posts }))
}
