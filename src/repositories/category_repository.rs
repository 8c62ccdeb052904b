use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Category;

// Input data for creating a new category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryData {
    pub slug: String,
    pub title: String,
    pub description: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

/// Inserts a new category.
pub async fn create_category(
    pool: &PgPool,
    data: CreateCategoryData,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (slug, title, description, is_published)
        VALUES ($1, $2, $3, $4)
        RETURNING id, slug, title, description, is_published, created_at
        "#,
    )
    .bind(data.slug)
    .bind(data.title)
    .bind(data.description)
    .bind(data.is_published)
    .fetch_one(pool)
    .await
}

pub async fn get_category_by_id(
    pool: &PgPool,
    category_id: Uuid,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, slug, title, description, is_published, created_at
        FROM categories
        WHERE id = $1
        "#,
    )
    .bind(category_id)
    .fetch_optional(pool)
    .await
}

/// Fetches a category by slug, only if it is published.
pub async fn get_published_category_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, slug, title, description, is_published, created_at
        FROM categories
        WHERE slug = $1 AND is_published
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

/// All categories, for the post form's choices.
pub async fn get_all_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, slug, title, description, is_published, created_at
        FROM categories
        ORDER BY title ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Publishes or hides a category. Returns the number of rows affected.
pub async fn set_category_published(
    pool: &PgPool,
    category_id: Uuid,
    is_published: bool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE categories SET is_published = $1 WHERE id = $2")
        .bind(is_published)
        .bind(category_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes a category; its posts keep existing without one.
pub async fn delete_category(pool: &PgPool, category_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
