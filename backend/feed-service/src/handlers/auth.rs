use std::future::Future;
use std::pin::Pin;

use actix_web::{web, FromRequest, HttpRequest};

use super::AppState;
use crate::error::AppError;
use crate::models::{User, UserId};

/// Header naming the calling user
pub const USER_ID_HEADER: &str = "X-USER-ID";

/// The calling user, resolved from `X-USER-ID`.
///
/// Extraction fails with 401 when the header is missing, not a positive
/// integer, or names a user that does not exist.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn id(&self) -> UserId {
        UserId(self.0.id)
    }
}

fn header_user_id(req: &HttpRequest) -> Option<UserId> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(UserId)
        .filter(|id| id.is_valid())
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let user_id = header_user_id(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let state =
                state.ok_or_else(|| AppError::Internal("application state missing".to_string()))?;
            let user_id = user_id.ok_or_else(|| {
                AppError::Unauthorized(format!("missing or invalid {} header", USER_ID_HEADER))
            })?;

            let user = state
                .users
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::Unauthorized(format!("unknown user {}", user_id)))?;

            Ok(AuthenticatedUser(user))
        })
    }
}
