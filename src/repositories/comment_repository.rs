use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Comment, CommentView};

/// Inserts a new comment on a post.
pub async fn create_comment(
    pool: &PgPool,
    post_id: Uuid,
    author_id: Uuid,
    text: &str,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, text)
        VALUES ($1, $2, $3)
        RETURNING id, post_id, author_id, text, is_published, created_at
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(text)
    .fetch_one(pool)
    .await
}

/// Fetches a comment only if it belongs to the given post.
pub async fn get_comment_for_post(
    pool: &PgPool,
    post_id: Uuid,
    comment_id: Uuid,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, text, is_published, created_at
        FROM comments
        WHERE id = $1 AND post_id = $2
        "#,
    )
    .bind(comment_id)
    .bind(post_id)
    .fetch_optional(pool)
    .await
}

/// Published comments of a post, oldest first.
pub async fn get_published_comments(
    pool: &PgPool,
    post_id: Uuid,
) -> Result<Vec<CommentView>, sqlx::Error> {
    sqlx::query_as::<_, CommentView>(
        r#"
        SELECT cm.id, cm.post_id, cm.author_id, u.username AS author_username,
               cm.text, cm.is_published, cm.created_at
        FROM comments cm
        JOIN users u ON u.id = cm.author_id
        WHERE cm.post_id = $1 AND cm.is_published
        ORDER BY cm.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

pub async fn update_comment(
    pool: &PgPool,
    comment_id: Uuid,
    text: &str,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments
        SET text = $1
        WHERE id = $2
        RETURNING id, post_id, author_id, text, is_published, created_at
        "#,
    )
    .bind(text)
    .bind(comment_id)
    .fetch_optional(pool)
    .await
}

/// Hides or shows a comment without deleting it.
pub async fn set_comment_published(
    pool: &PgPool,
    comment_id: Uuid,
    is_published: bool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE comments SET is_published = $1 WHERE id = $2")
        .bind(is_published)
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes a comment by its ID.
/// Returns the number of rows affected.
pub async fn delete_comment(pool: &PgPool, comment_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Number of comments on a post, published or not.
pub async fn count_all_comments(pool: &PgPool, post_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(pool)
        .await
}
