use sqlx::PgPool;
use uuid::Uuid;

use crate::forms::ValidProfile;
use crate::models::User;

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, public_key, created_at";

// Postgres names for the UNIQUE constraints on `users`.
const USERNAME_CONSTRAINT: &str = "users_username_key";
const PUBLIC_KEY_CONSTRAINT: &str = "users_public_key_key";
const UNIQUE_VIOLATION: &str = "23505";

/// Which unique column of `users` a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    Username,
    PublicKey,
}

/// Classifies a failed insert/update on `users`. The uniqueness pre-checks can
/// race with a concurrent write; this catches what slips through.
pub fn unique_conflict(error: &sqlx::Error) -> Option<UserConflict> {
    let db_error = error.as_database_error()?;
    if db_error.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    match db_error.constraint() {
        Some(USERNAME_CONSTRAINT) => Some(UserConflict::Username),
        Some(PUBLIC_KEY_CONSTRAINT) => Some(UserConflict::PublicKey),
        _ => None,
    }
}

/// Registers a new user bound to the given public key.
pub async fn create_user(
    pool: &PgPool,
    public_key: &[u8],
    profile: &ValidProfile,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, first_name, last_name, email, public_key)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(public_key)
    .fetch_one(pool)
    .await
}

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_public_key(
    pool: &PgPool,
    public_key: &[u8],
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE public_key = $1"))
        .bind(public_key)
        .fetch_optional(pool)
        .await
}

/// Whether `username` belongs to someone other than `except` (if given).
pub async fn is_username_taken(
    pool: &PgPool,
    username: &str,
    except: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM users
            WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(username)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// Updates a user's editable profile fields.
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    profile: &ValidProfile,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET username = $1, first_name = $2, last_name = $3, email = $4
        WHERE id = $5
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
