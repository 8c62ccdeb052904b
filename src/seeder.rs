use sqlx::{Executor, PgPool};
use tracing::info;

const CATEGORIES: &[(&str, &str, &str)] = &[
    ("travel", "Travel", "Trips, routes and places worth the detour."),
    ("food", "Food", "Recipes, restaurants and street food."),
    ("notes", "Notes", "Everything else."),
];

const LOCATIONS: &[&str] = &["Island", "Mountains", "City"];

/// Seed the database with the initial categories and locations.
///
/// Idempotent: inserts use `ON CONFLICT DO NOTHING`,
/// so it can safely be run multiple times.
pub async fn seed_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Seeding categories");
    for (slug, title, description) in CATEGORIES {
        pool.execute(
            sqlx::query(
                "INSERT INTO categories (slug, title, description) VALUES ($1, $2, $3) ON CONFLICT (slug) DO NOTHING",
            )
            .bind(*slug)
            .bind(*title)
            .bind(*description),
        )
        .await?;
        info!(category_slug = %slug, "Ensured category");
    }

    info!("Seeding locations");
    for name in LOCATIONS {
        pool.execute(
            sqlx::query("INSERT INTO locations (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(*name),
        )
        .await?;
        info!(location = %name, "Ensured location");
    }

    info!("Database seeding completed successfully");
    Ok(())
}
