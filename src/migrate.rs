//! Database migration utilities

use sqlx::{Sqlite, migrate::MigrateDatabase};
use sqlx_migrator::{Migrate, Plan};

use crate::{config::Config, db::create_pool};

/// Create the database if needed and run all migrations
pub async fn migrate(config: &Config) -> anyhow::Result<()> {
    let url = &config.database.url;

    if !Sqlite::database_exists(url).await? {
        tracing::info!("Creating database {url}");
        Sqlite::create_database(url).await?;
    }

    let pool = create_pool(url, 1).await?;
    let mut conn = pool.acquire().await?;

    antigravipizza_db::migrator::<Sqlite>()?
        .run(&mut conn, &Plan::apply_all())
        .await?;

    drop(conn);
    pool.close().await;

    tracing::info!("Catalog database migrated");

    Ok(())
}

/// Drop the database if it exists and migrate a fresh one
pub async fn reset(config: &Config) -> anyhow::Result<()> {
    let url = &config.database.url;

    if Sqlite::database_exists(url).await? {
        Sqlite::drop_database(url).await?;
        tracing::info!("Dropped database {url}");
    }

    migrate(config).await
}
