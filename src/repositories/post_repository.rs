use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::forms::ValidPost;
use crate::models::{Post, PostView};
use crate::utils::PageWindow;
use crate::visibility::{Viewer, VISIBLE_TO_VIEWER};

const POST_COLUMNS: &str = "id, author_id, title, text, category_id, location_id, pub_date, is_published, image_url, created_at";

// Joined shape behind `PostView`. The comment count only covers published comments.
const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.author_id, u.username AS author_username, p.title, p.text,
           p.category_id, c.slug AS category_slug, c.title AS category_title,
           c.is_published AS category_is_published,
           p.location_id, l.name AS location_name, l.is_published AS location_is_published,
           p.pub_date, p.is_published, p.image_url, p.created_at,
           (SELECT COUNT(*) FROM comments cm
             WHERE cm.post_id = p.id AND cm.is_published) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

// $3 and $4 narrow the listing to one category or one author when bound.
const SCOPE_FILTER: &str = "($3::uuid IS NULL OR p.category_id = $3) AND ($4::uuid IS NULL OR p.author_id = $4)";

/// Which posts a listing covers before the visibility filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Category(Uuid),
    Author(Uuid),
}

impl PostScope {
    fn category_id(&self) -> Option<Uuid> {
        match self {
            PostScope::Category(id) => Some(*id),
            _ => None,
        }
    }

    fn author_id(&self) -> Option<Uuid> {
        match self {
            PostScope::Author(id) => Some(*id),
            _ => None,
        }
    }
}

/// Counts the posts in `scope` the viewer may see.
pub async fn count_visible_posts(
    pool: &PgPool,
    viewer: Viewer,
    scope: PostScope,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(&format!(
        r#"
        SELECT COUNT(*)
        FROM posts p
        LEFT JOIN categories c ON c.id = p.category_id
        LEFT JOIN locations l ON l.id = p.location_id
        WHERE {VISIBLE_TO_VIEWER} AND {SCOPE_FILTER}
        "#
    ))
    .bind(viewer.user_id())
    .bind(now)
    .bind(scope.category_id())
    .bind(scope.author_id())
    .fetch_one(pool)
    .await
}

/// Fetches one page of the posts in `scope` the viewer may see, newest publication first.
pub async fn list_visible_posts(
    pool: &PgPool,
    viewer: Viewer,
    scope: PostScope,
    now: DateTime<Utc>,
    window: &PageWindow,
) -> Result<Vec<PostView>, sqlx::Error> {
    sqlx::query_as::<_, PostView>(&format!(
        r#"
        {POST_VIEW_SELECT}
        WHERE {VISIBLE_TO_VIEWER} AND {SCOPE_FILTER}
        ORDER BY p.pub_date DESC, p.created_at DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(viewer.user_id())
    .bind(now)
    .bind(scope.category_id())
    .bind(scope.author_id())
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(pool)
    .await
}

/// Fetches a post with its joined data, regardless of visibility.
pub async fn get_post_view(pool: &PgPool, post_id: Uuid) -> Result<Option<PostView>, sqlx::Error> {
    sqlx::query_as::<_, PostView>(&format!("{POST_VIEW_SELECT} WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_post_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Inserts a new post written by `author_id`.
pub async fn create_post(
    pool: &PgPool,
    author_id: Uuid,
    data: &ValidPost,
    image_url: Option<&str>,
) -> Result<Post, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        INSERT INTO posts (author_id, title, text, category_id, location_id, pub_date, is_published, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(author_id)
    .bind(&data.title)
    .bind(&data.text)
    .bind(data.category_id)
    .bind(data.location_id)
    .bind(data.pub_date)
    .bind(data.is_published)
    .bind(image_url)
    .fetch_one(pool)
    .await
}

/// Updates a post's fields. The author never changes.
pub async fn update_post(
    pool: &PgPool,
    post_id: Uuid,
    data: &ValidPost,
    image_url: Option<&str>,
) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        UPDATE posts
        SET title = $1, text = $2, category_id = $3, location_id = $4,
            pub_date = $5, is_published = $6, image_url = $7
        WHERE id = $8
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(&data.title)
    .bind(&data.text)
    .bind(data.category_id)
    .bind(data.location_id)
    .bind(data.pub_date)
    .bind(data.is_published)
    .bind(image_url)
    .bind(post_id)
    .fetch_optional(pool)
    .await
}

/// Deletes a post; its comments go with it (ON DELETE CASCADE).
/// Returns the deleted row so the caller can clean up its image.
pub async fn delete_post(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
    ))
    .bind(post_id)
    .fetch_optional(pool)
    .await
}
