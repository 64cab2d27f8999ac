use std::path::PathBuf;

use anyhow::Result;
use antigravipizza_integrity::{Report, RepairExecutor, Selections, Session, TagRule};

use crate::config::Config;

pub enum MergeTarget {
    Chosen { winner: String, losers: Vec<String> },
    Auto(Vec<String>),
}

pub async fn audit(config: Config, output: Option<PathBuf>) -> Result<()> {
    let normalizer = config.normalizer.build()?;
    let pool = super::open_pool(&config).await?;
    let mut conn = pool.acquire().await?;

    let report = antigravipizza_integrity::audit(&mut conn, normalizer.aliases()).await?;
    if !report.is_clean() {
        tracing::warn!("{} defects found", report.defect_count());
    }

    match output {
        Some(path) => super::write_json(&path, &report),
        None => super::print_json(&report),
    }
}

pub async fn normalize(config: Config, dry_run: bool) -> Result<()> {
    let normalizer = config.normalizer.build()?;
    let pool = super::open_pool(&config).await?;

    let mut session = Session::begin(&pool, dry_run).await?;
    let summary = normalizer.normalize_catalog(&mut session).await?;
    session.finish().await?;

    super::print_json(&summary)
}

pub async fn repair(
    config: Config,
    report: Option<PathBuf>,
    selections: Selections,
    dry_run: bool,
) -> Result<()> {
    if selections.is_empty() {
        anyhow::bail!(
            "select at least one group: --remove-dangling, --remove-malformed, --promote-embedded, --fix-mismatches or --all"
        );
    }

    let executor = RepairExecutor::new(config.normalizer.build()?);
    let pool = super::open_pool(&config).await?;

    let report: Report = match report {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => {
            let mut conn = pool.acquire().await?;
            antigravipizza_integrity::audit(&mut conn, executor.normalizer().aliases()).await?
        }
    };

    let mut session = Session::begin(&pool, dry_run).await?;
    let outcome = executor.apply_report(&mut session, &report, selections).await?;
    session.finish().await?;

    super::print_json(&outcome)
}

pub async fn merge(config: Config, target: MergeTarget, dry_run: bool) -> Result<()> {
    let executor = RepairExecutor::new(config.normalizer.build()?);
    let pool = super::open_pool(&config).await?;

    let mut session = Session::begin(&pool, dry_run).await?;
    let outcome = match target {
        MergeTarget::Chosen { winner, losers } => {
            executor
                .merge_ingredients(session.conn(), &winner, &losers)
                .await?
        }
        MergeTarget::Auto(candidates) => {
            executor
                .normalizer()
                .merge_equivalent(session.conn(), &candidates)
                .await?
        }
    };
    session.finish().await?;

    super::print_json(&outcome)
}

pub async fn retag(config: Config, rule: TagRule, dry_run: bool) -> Result<()> {
    let pool = super::open_pool(&config).await?;

    let mut session = Session::begin(&pool, dry_run).await?;
    let outcome = rule.apply(&mut session).await?;
    session.finish().await?;

    super::print_json(&outcome)
}

pub async fn delete_ingredient(config: Config, id: String) -> Result<()> {
    let executor = RepairExecutor::new(config.normalizer.build()?);
    let pool = super::open_pool(&config).await?;
    let mut conn = pool.acquire().await?;

    executor.delete_ingredient(&mut conn, &id).await?;

    Ok(())
}
