//! Feed update algorithm shared by every Feed Store implementation.
//!
//! A feed is a list of post ids, newest first, never longer than the cap and
//! never holding the same id twice. Applying the same post twice leaves the
//! feed as it was after the first application, which is what makes
//! redelivered fan-out tasks harmless.

use crate::models::PostId;

/// Upper bound on stored feed length; smaller caps may be configured
pub const MAX_FEED_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedChange {
    /// Post inserted at the front; oldest entries beyond the cap dropped
    Prepended,
    /// Post already in the feed; nothing changed
    AlreadyPresent,
}

impl FeedChange {
    pub fn is_changed(self) -> bool {
        matches!(self, FeedChange::Prepended)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedChange::Prepended => "prepended",
            FeedChange::AlreadyPresent => "already_present",
        }
    }
}

/// Put `post_id` at the front of `feed` unless it is already there.
///
/// An existing entry keeps its position. `max_len` above [`MAX_FEED_LEN`]
/// is treated as [`MAX_FEED_LEN`].
pub fn prepend_post(feed: &mut Vec<PostId>, post_id: PostId, max_len: usize) -> FeedChange {
    if feed.contains(&post_id) {
        return FeedChange::AlreadyPresent;
    }

    feed.insert(0, post_id);
    feed.truncate(max_len.min(MAX_FEED_LEN));
    FeedChange::Prepended
}
