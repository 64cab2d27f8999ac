pub mod catalog;
pub mod integrity;

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;

async fn open_pool(config: &Config) -> Result<SqlitePool> {
    crate::db::create_pool(&config.database.url, config.database.max_connections).await
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    tracing::info!("Wrote {}", path.display());

    Ok(())
}
