use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Location;

pub async fn create_location(
    pool: &PgPool,
    name: &str,
    is_published: bool,
) -> Result<Location, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        r#"
        INSERT INTO locations (name, is_published)
        VALUES ($1, $2)
        RETURNING id, name, is_published, created_at
        "#,
    )
    .bind(name)
    .bind(is_published)
    .fetch_one(pool)
    .await
}

pub async fn get_location_by_id(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "SELECT id, name, is_published, created_at FROM locations WHERE id = $1",
    )
    .bind(location_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_all_locations(pool: &PgPool) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "SELECT id, name, is_published, created_at FROM locations ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn set_location_published(
    pool: &PgPool,
    location_id: Uuid,
    is_published: bool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE locations SET is_published = $1 WHERE id = $2")
        .bind(is_published)
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_location(pool: &PgPool, location_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM locations WHERE id = $1")
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
