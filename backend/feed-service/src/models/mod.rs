use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier. Zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Post identifier, assigned in creation order. Zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl UserId {
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl PostId {
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub text: String,
    /// Soft-delete flag; removed posts are hidden from every read
    #[serde(skip_serializing)]
    pub removed: bool,
}

impl Post {
    pub fn post_id(&self) -> PostId {
        PostId(self.id)
    }

    pub fn creator(&self) -> UserId {
        UserId(self.creator_id)
    }
}

/// Queue message announcing a freshly created post.
///
/// Wire format: the decimal post id and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPostEvent {
    pub post_id: PostId,
}

/// Stream entry field that carries the post id
pub const NEW_POST_FIELD: &str = "post_id";

impl NewPostEvent {
    pub fn new(post_id: PostId) -> Self {
        Self { post_id }
    }

    pub fn encode(&self) -> String {
        self.post_id.0.to_string()
    }
}

/// Why a queue payload could not be turned into a [`NewPostEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPayload(pub String);

impl fmt::Display for MalformedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed payload {:?}", self.0)
    }
}

impl FromStr for NewPostEvent {
    type Err = MalformedPayload;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self::new(PostId(id))),
            _ => Err(MalformedPayload(raw.to_string())),
        }
    }
}
