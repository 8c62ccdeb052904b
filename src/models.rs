use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::visibility::PostVisibility;

/// A registered author, bound to the ed25519 key they authenticate with.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub public_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A topic that groups posts, addressed by its slug.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// A post row as stored.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub text: String,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A post joined with its author, category and location, annotated with the
/// number of published comments. This is what listings and the detail view show.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub title: String,
    pub text: String,
    pub category_id: Option<Uuid>,
    pub category_slug: Option<String>,
    pub category_title: Option<String>,
    pub category_is_published: Option<bool>,
    pub location_id: Option<Uuid>,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

impl PostView {
    pub fn visibility(&self) -> PostVisibility {
        PostVisibility {
            author_id: self.author_id,
            is_published: self.is_published,
            pub_date: self.pub_date,
            category_published: self.category_id.map(|_| self.category_is_published.unwrap_or(false)),
            location_published: self.location_id.map(|_| self.location_is_published.unwrap_or(false)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// A comment with its author's username, as shown under a post.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}
