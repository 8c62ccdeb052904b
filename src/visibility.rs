//! Who may see which post.
//!
//! A post is publicly visible when it is published, its publication date has
//! passed, and its category and location (when it has them) are published too.
//! Authors always see their own posts.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::User;

/// SQL form of [`Viewer::can_see`] over `posts p LEFT JOIN categories c LEFT JOIN locations l`.
///
/// Binds the viewer's user id (or NULL for anonymous viewers) as `$1` and
/// "now" as `$2`. A NULL viewer makes the ownership arm NULL, so only the
/// public arm can admit a row.
pub const VISIBLE_TO_VIEWER: &str = "(p.author_id = $1 OR (
        p.is_published
        AND p.pub_date < $2
        AND COALESCE(c.is_published, TRUE)
        AND COALESCE(l.is_published, TRUE)
    ))";

/// The facts about a post the visibility rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct PostVisibility {
    pub author_id: Uuid,
    pub is_published: bool,
    pub pub_date: DateTime<Utc>,
    /// `None` when the post has no category.
    pub category_published: Option<bool>,
    /// `None` when the post has no location.
    pub location_published: Option<bool>,
}

pub fn is_publicly_visible(post: &PostVisibility, now: DateTime<Utc>) -> bool {
    post.is_published
        && post.pub_date < now
        && post.category_published.unwrap_or(true)
        && post.location_published.unwrap_or(true)
}

/// The user a read view is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(Uuid),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }

    pub fn owns(&self, author_id: Uuid) -> bool {
        self.user_id() == Some(author_id)
    }

    pub fn can_see(&self, post: &PostVisibility, now: DateTime<Utc>) -> bool {
        self.owns(post.author_id) || is_publicly_visible(post, now)
    }
}

impl From<Option<&User>> for Viewer {
    fn from(user: Option<&User>) -> Self {
        match user {
            Some(user) => Viewer::User(user.id),
            None => Viewer::Anonymous,
        }
    }
}
