use std::path::PathBuf;

use anyhow::Result;
use antigravipizza::cli::{catalog, integrity, integrity::MergeTarget};
use antigravipizza::config::Config;
use antigravipizza_integrity::{Selections, TagRule};
use clap::{Args, Parser, Subcommand};

/// antigravipizza - ingredient catalog integrity tooling
#[derive(Parser)]
#[command(name = "antigravipizza")]
#[command(about = "Audit, normalize and repair the pizza ingredient catalog", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Drop database if exists and recreate with migrations
    Reset,
    /// Insert the canonical ingredient categories that are missing
    SeedCategories,
    /// Import an ingredients, preparations or recipes document
    Import {
        file: PathBuf,

        /// Promote embedded usages once the document is imported
        #[arg(long)]
        promote: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// Write ingredients.json, preparations.json and recipes.json to a directory
    Export { dir: PathBuf },
    /// Scan every usage list and print the integrity report
    Audit {
        /// Save the report instead of printing it
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Promote embedded usages and drop stale labels, one owner at a time
    Normalize {
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply the selected groups of an integrity report
    Repair(RepairArgs),
    /// Merge duplicate ingredients into one
    Merge(MergeArgs),
    /// Remove and add tags on ingredients whose name contains a string
    Retag {
        #[arg(long)]
        name_contains: String,

        #[arg(long)]
        remove: Vec<String>,

        #[arg(long)]
        add: Vec<String>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Delete an erroneous ingredient that nothing references
    DeleteIngredient { id: String },
}

#[derive(Args)]
struct RepairArgs {
    /// Report file produced by `audit --output`. A fresh audit runs when omitted
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    remove_dangling: bool,

    #[arg(long)]
    remove_malformed: bool,

    #[arg(long)]
    promote_embedded: bool,

    #[arg(long)]
    fix_mismatches: bool,

    /// Select every group
    #[arg(long)]
    all: bool,

    #[arg(long)]
    dry_run: bool,
}

impl RepairArgs {
    fn selections(&self) -> Selections {
        if self.all {
            return Selections::all();
        }

        Selections {
            remove_dangling: self.remove_dangling,
            remove_malformed: self.remove_malformed,
            promote_embedded: self.promote_embedded,
            fix_mismatches: self.fix_mismatches,
        }
    }
}

#[derive(Args)]
struct MergeArgs {
    /// Ingredient that survives the merge
    #[arg(long, requires = "loser", conflicts_with = "auto")]
    winner: Option<String>,

    /// Ingredient merged into the winner, repeatable
    #[arg(long)]
    loser: Vec<String>,

    /// Candidate ids. The winner is picked automatically when the choice is safe
    #[arg(long, num_args = 2.., required_unless_present = "winner")]
    auto: Vec<String>,

    #[arg(long)]
    dry_run: bool,
}

impl MergeArgs {
    fn target(self) -> MergeTarget {
        match self.winner {
            Some(winner) => MergeTarget::Chosen {
                winner,
                losers: self.loser,
            },
            None => MergeTarget::Auto(self.auto),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.clone())?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    antigravipizza::observability::init_observability(&config.observability)?;

    match cli.command {
        Commands::Migrate => migrate_command(config).await,
        Commands::Reset => reset_command(config).await,
        Commands::SeedCategories => seed_categories_command(config).await,
        Commands::Import {
            file,
            promote,
            dry_run,
        } => import_command(config, file, promote, dry_run).await,
        Commands::Export { dir } => export_command(config, dir).await,
        Commands::Audit { output } => audit_command(config, output).await,
        Commands::Normalize { dry_run } => normalize_command(config, dry_run).await,
        Commands::Repair(args) => repair_command(config, args).await,
        Commands::Merge(args) => merge_command(config, args).await,
        Commands::Retag {
            name_contains,
            remove,
            add,
            dry_run,
        } => {
            let rule = TagRule {
                name_contains,
                remove,
                add,
            };
            retag_command(config, rule, dry_run).await
        }
        Commands::DeleteIngredient { id } => delete_ingredient_command(config, id).await,
    }
}

#[tracing::instrument(skip(config))]
async fn migrate_command(config: Config) -> Result<()> {
    antigravipizza::migrate::migrate(&config).await
}

#[tracing::instrument(skip(config))]
async fn reset_command(config: Config) -> Result<()> {
    antigravipizza::migrate::reset(&config).await
}

#[tracing::instrument(skip(config))]
async fn seed_categories_command(config: Config) -> Result<()> {
    catalog::seed_categories(config).await
}

#[tracing::instrument(skip(config))]
async fn import_command(config: Config, file: PathBuf, promote: bool, dry_run: bool) -> Result<()> {
    catalog::import(config, file, promote, dry_run).await
}

#[tracing::instrument(skip(config))]
async fn export_command(config: Config, dir: PathBuf) -> Result<()> {
    catalog::export(config, dir).await
}

#[tracing::instrument(skip(config))]
async fn audit_command(config: Config, output: Option<PathBuf>) -> Result<()> {
    integrity::audit(config, output).await
}

#[tracing::instrument(skip(config))]
async fn normalize_command(config: Config, dry_run: bool) -> Result<()> {
    integrity::normalize(config, dry_run).await
}

#[tracing::instrument(skip_all, fields(dry_run = args.dry_run))]
async fn repair_command(config: Config, args: RepairArgs) -> Result<()> {
    let selections = args.selections();
    integrity::repair(config, args.report, selections, args.dry_run).await
}

#[tracing::instrument(skip_all, fields(dry_run = args.dry_run))]
async fn merge_command(config: Config, args: MergeArgs) -> Result<()> {
    let dry_run = args.dry_run;
    integrity::merge(config, args.target(), dry_run).await
}

#[tracing::instrument(skip(config))]
async fn retag_command(config: Config, rule: TagRule, dry_run: bool) -> Result<()> {
    integrity::retag(config, rule, dry_run).await
}

#[tracing::instrument(skip(config))]
async fn delete_ingredient_command(config: Config, id: String) -> Result<()> {
    integrity::delete_ingredient(config, id).await
}
