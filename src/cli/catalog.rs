use std::path::PathBuf;

use anyhow::Result;
use antigravipizza_catalog::seed::{self, SeedDocument};
use antigravipizza_integrity::{Session, import::import_document};
use serde_json::json;

use crate::config::Config;

pub async fn seed_categories(config: Config) -> Result<()> {
    let pool = super::open_pool(&config).await?;
    let mut conn = pool.acquire().await?;

    let created = seed::seed_default_categories(&mut conn).await?;
    tracing::info!("{} categories created", created.len());

    super::print_json(&json!({
        "created": created.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
    }))
}

pub async fn import(config: Config, file: PathBuf, promote: bool, dry_run: bool) -> Result<()> {
    let normalizer = config.normalizer.build()?;
    let document = SeedDocument::parse(&std::fs::read_to_string(&file)?)?;
    let pool = super::open_pool(&config).await?;

    let mut session = Session::begin(&pool, dry_run).await?;
    let summary = import_document(&mut session, &normalizer, document).await?;
    let normalized = if promote {
        Some(normalizer.normalize_catalog(&mut session).await?)
    } else {
        None
    };
    session.finish().await?;

    super::print_json(&json!({
        "import": summary,
        "normalize": normalized,
    }))
}

pub async fn export(config: Config, dir: PathBuf) -> Result<()> {
    let pool = super::open_pool(&config).await?;
    let mut conn = pool.acquire().await?;

    std::fs::create_dir_all(&dir)?;

    let ingredients = seed::export_ingredients(&mut conn).await?;
    super::write_json(&dir.join("ingredients.json"), &ingredients)?;

    let preparations = seed::export_preparations(&mut conn).await?;
    super::write_json(&dir.join("preparations.json"), &preparations)?;

    let recipes = seed::export_recipes(&mut conn).await?;
    super::write_json(&dir.join("recipes.json"), &recipes)?;

    tracing::info!(
        ingredients = ingredients.count,
        preparations = preparations.count,
        recipes = recipes.count,
        "Catalog exported to {}",
        dir.display()
    );

    Ok(())
}
