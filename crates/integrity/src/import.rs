//! Loads seed and backup documents into the catalog.
//!
//! Category names in the documents go through the alias table. A record whose
//! name already exists updates that entry and keeps its id and creation date,
//! so importing the same document twice does not duplicate anything.

use antigravipizza_catalog::{
    CatalogError, Ingredient, Preparation, Recipe,
    seed::{IngredientRecord, PreparationRecord, RecipeRecord, SeedDocument},
    store::{ingredient, preparation, recipe},
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use strum::Display;

use crate::{
    IntegrityError, IntegrityResult, Session,
    normalizer::{Failure, Normalizer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentKind {
    Ingredients,
    Preparations,
    Recipes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub kind: DocumentKind,
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<Failure>,
    pub dry_run: bool,
}

enum Imported {
    Created,
    Updated,
}

pub async fn import_document(
    session: &mut Session,
    normalizer: &Normalizer,
    document: SeedDocument,
) -> IntegrityResult<ImportSummary> {
    normalizer.verify_categories(session.conn()).await?;

    let mut summary = ImportSummary {
        kind: match &document {
            SeedDocument::Ingredients(_) => DocumentKind::Ingredients,
            SeedDocument::Preparations(_) => DocumentKind::Preparations,
            SeedDocument::Recipes(_) => DocumentKind::Recipes,
        },
        records: document.count(),
        created: 0,
        updated: 0,
        failures: vec![],
        dry_run: session.is_dry_run(),
    };

    match document {
        SeedDocument::Ingredients(document) => {
            for record in document.ingredients {
                let name = record.name.to_owned();
                let result = async {
                    let mut tx = session.unit().await?;
                    let imported = import_ingredient(&mut tx, normalizer, record).await?;
                    tx.commit().await?;
                    Ok::<_, IntegrityError>(imported)
                }
                .await;
                tally(&mut summary, name, result)?;
            }
        }
        SeedDocument::Preparations(document) => {
            for record in document.preparations {
                let name = record.name.to_owned();
                let result = async {
                    let mut tx = session.unit().await?;
                    let imported = import_preparation(&mut tx, normalizer, record).await?;
                    tx.commit().await?;
                    Ok::<_, IntegrityError>(imported)
                }
                .await;
                tally(&mut summary, name, result)?;
            }
        }
        SeedDocument::Recipes(document) => {
            for record in document.recipes {
                let name = record.name.to_owned();
                let result = async {
                    let mut tx = session.unit().await?;
                    let imported = import_recipe(&mut tx, record).await?;
                    tx.commit().await?;
                    Ok::<_, IntegrityError>(imported)
                }
                .await;
                tally(&mut summary, name, result)?;
            }
        }
    }

    tracing::info!(
        kind = %summary.kind,
        created = summary.created,
        updated = summary.updated,
        failed = summary.failures.len(),
        dry_run = summary.dry_run,
        "document imported"
    );

    Ok(summary)
}

fn tally(
    summary: &mut ImportSummary,
    name: String,
    result: IntegrityResult<Imported>,
) -> IntegrityResult<()> {
    match result {
        Ok(Imported::Created) => summary.created += 1,
        Ok(Imported::Updated) => summary.updated += 1,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            tracing::error!(name, "import failed: {err}");
            summary.failures.push(Failure {
                target: name,
                error: err.to_string(),
            });
        }
    }

    Ok(())
}

async fn import_ingredient(
    conn: &mut SqliteConnection,
    normalizer: &Normalizer,
    record: IngredientRecord,
) -> IntegrityResult<Imported> {
    let canonical = normalizer
        .aliases()
        .category_for(&record.name, record.category.as_deref());
    let category = normalizer.aliases().find_category(conn, canonical).await?;
    let existing = ingredient::find_by_name(conn, &record.name).await?;

    let mut ingredient: Ingredient = record.into_ingredient(category.id, normalizer.default_unit());

    let imported = match existing {
        Some(existing) => {
            ingredient.id = existing.id;
            ingredient.date_added = existing.date_added;
            Imported::Updated
        }
        None => Imported::Created,
    };

    ingredient::upsert(conn, &ingredient).await?;
    tracing::debug!(name = ingredient.name, "ingredient imported");

    Ok(imported)
}

async fn import_preparation(
    conn: &mut SqliteConnection,
    normalizer: &Normalizer,
    record: PreparationRecord,
) -> IntegrityResult<Imported> {
    if record.name.trim().is_empty() {
        return Err(CatalogError::Validation("preparation name is blank".to_owned()).into());
    }

    let canonical = normalizer.aliases().canonical_for(record.category.as_deref());
    let category = normalizer.aliases().find_category(conn, canonical).await?;
    let existing = preparation::find_by_name(conn, &record.name).await?;

    let mut preparation: Preparation = record.into_preparation(category.id);

    let imported = match existing {
        Some(existing) => {
            preparation.id = existing.id;
            preparation.date_added = existing.date_added;
            Imported::Updated
        }
        None => Imported::Created,
    };

    preparation::upsert(conn, &preparation).await?;
    tracing::debug!(name = preparation.name, "preparation imported");

    Ok(imported)
}

async fn import_recipe(conn: &mut SqliteConnection, record: RecipeRecord) -> IntegrityResult<Imported> {
    let existing = recipe::find_by_name(conn, &record.name).await?;
    let mut recipe = Recipe::from(record);

    let imported = match existing {
        Some(existing) => {
            recipe.id = existing.id;
            recipe.created_at = existing.created_at;
            Imported::Updated
        }
        None => Imported::Created,
    };

    recipe::upsert(conn, &recipe).await?;
    tracing::debug!(name = recipe.name, "recipe imported");

    Ok(imported)
}
