use anyhow::Context;
use blog_server::config::Config;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blog_server=info".into()),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database for seeding")?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    blog_server::seeder::seed_database(&pool).await?;

    Ok(())
}
