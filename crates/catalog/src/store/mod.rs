//! Durable keyed storage for categories, ingredients, preparations and recipes.
//!
//! Every primitive takes a `&mut SqliteConnection`, so the same code runs on a
//! pooled connection, inside a transaction or inside a savepoint. [`Catalog`]
//! wraps a pool and exposes the same operations for callers that do not need
//! to group writes.

pub mod category;
pub mod ingredient;
pub mod preparation;
pub mod recipe;

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    Category, CatalogResult, Ingredient, Owner, OwnerKind, Preparation, Recipe, Resolver,
};

pub use ingredient::IngredientFilter;

#[derive(Clone)]
pub struct Catalog(pub SqlitePool);

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.0
    }

    pub async fn get_category_by_id(&self, id: &str) -> CatalogResult<Option<Category>> {
        let mut conn = self.0.acquire().await?;
        category::find_by_id(&mut conn, id).await
    }

    pub async fn get_category_by_name(&self, name: &str) -> CatalogResult<Option<Category>> {
        let mut conn = self.0.acquire().await?;
        category::find_by_name(&mut conn, name).await
    }

    pub async fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        let mut conn = self.0.acquire().await?;
        category::list(&mut conn).await
    }

    pub async fn upsert_category(&self, category: &Category) -> CatalogResult<String> {
        let mut conn = self.0.acquire().await?;
        category::upsert(&mut conn, category).await
    }

    pub async fn delete_category(&self, id: &str) -> CatalogResult<bool> {
        let mut conn = self.0.acquire().await?;
        category::delete(&mut conn, id).await
    }

    pub async fn get_ingredient_by_id(&self, id: &str) -> CatalogResult<Option<Ingredient>> {
        let mut conn = self.0.acquire().await?;
        ingredient::find_by_id(&mut conn, id).await
    }

    pub async fn get_ingredient_by_name(&self, name: &str) -> CatalogResult<Option<Ingredient>> {
        let mut conn = self.0.acquire().await?;
        ingredient::find_by_name(&mut conn, name).await
    }

    pub async fn list_ingredients(
        &self,
        filter: &IngredientFilter,
    ) -> CatalogResult<Vec<Ingredient>> {
        let mut conn = self.0.acquire().await?;
        ingredient::list(&mut conn, filter).await
    }

    pub async fn upsert_ingredient(&self, ingredient: &Ingredient) -> CatalogResult<String> {
        let mut conn = self.0.acquire().await?;
        ingredient::upsert(&mut conn, ingredient).await
    }

    pub async fn delete_ingredient(&self, id: &str) -> CatalogResult<bool> {
        let mut conn = self.0.acquire().await?;
        ingredient::delete(&mut conn, id).await
    }

    pub async fn get_preparation_by_id(&self, id: &str) -> CatalogResult<Option<Preparation>> {
        let mut conn = self.0.acquire().await?;
        preparation::find_by_id(&mut conn, id).await
    }

    pub async fn get_preparation_by_name(
        &self,
        name: &str,
    ) -> CatalogResult<Option<Preparation>> {
        let mut conn = self.0.acquire().await?;
        preparation::find_by_name(&mut conn, name).await
    }

    pub async fn list_preparations(&self) -> CatalogResult<Vec<Preparation>> {
        let mut conn = self.0.acquire().await?;
        preparation::list(&mut conn).await
    }

    pub async fn upsert_preparation(&self, preparation: &Preparation) -> CatalogResult<String> {
        let mut conn = self.0.acquire().await?;
        preparation::upsert(&mut conn, preparation).await
    }

    pub async fn delete_preparation(&self, id: &str) -> CatalogResult<bool> {
        let mut conn = self.0.acquire().await?;
        preparation::delete(&mut conn, id).await
    }

    pub async fn get_recipe_by_id(&self, id: &str) -> CatalogResult<Option<Recipe>> {
        let mut conn = self.0.acquire().await?;
        recipe::find_by_id(&mut conn, id).await
    }

    pub async fn get_recipe_by_name(&self, name: &str) -> CatalogResult<Option<Recipe>> {
        let mut conn = self.0.acquire().await?;
        recipe::find_by_name(&mut conn, name).await
    }

    pub async fn list_recipes(&self) -> CatalogResult<Vec<Recipe>> {
        let mut conn = self.0.acquire().await?;
        recipe::list(&mut conn).await
    }

    pub async fn upsert_recipe(&self, recipe: &Recipe) -> CatalogResult<String> {
        let mut conn = self.0.acquire().await?;
        recipe::upsert(&mut conn, recipe).await
    }

    pub async fn delete_recipe(&self, id: &str) -> CatalogResult<bool> {
        let mut conn = self.0.acquire().await?;
        recipe::delete(&mut conn, id).await
    }

    pub async fn load_owners(&self) -> CatalogResult<Vec<Owner>> {
        let mut conn = self.0.acquire().await?;
        load_owners(&mut conn).await
    }

    /// Snapshot of the ingredient registry for bulk resolution.
    pub async fn resolver(&self) -> CatalogResult<Resolver> {
        let mut conn = self.0.acquire().await?;
        Resolver::load(&mut conn).await
    }
}

/// Every preparation followed by every recipe, each group ordered by name.
pub async fn load_owners(conn: &mut SqliteConnection) -> CatalogResult<Vec<Owner>> {
    let mut owners: Vec<Owner> = preparation::list(conn)
        .await?
        .into_iter()
        .map(Owner::Preparation)
        .collect();

    owners.extend(recipe::list(conn).await?.into_iter().map(Owner::Recipe));

    Ok(owners)
}

pub async fn find_owner(
    conn: &mut SqliteConnection,
    kind: OwnerKind,
    id: &str,
) -> CatalogResult<Option<Owner>> {
    Ok(match kind {
        OwnerKind::Preparation => preparation::find_by_id(conn, id).await?.map(Owner::Preparation),
        OwnerKind::Recipe => recipe::find_by_id(conn, id).await?.map(Owner::Recipe),
    })
}

/// Writes an owner back in a single row update.
pub async fn save_owner(conn: &mut SqliteConnection, owner: &Owner) -> CatalogResult<String> {
    match owner {
        Owner::Preparation(p) => preparation::upsert(conn, p).await,
        Owner::Recipe(r) => recipe::upsert(conn, r).await,
    }
}

/// Number of usages pointing at each ingredient id, across every list of
/// every owner. Ids that nothing references are absent.
pub fn count_references(owners: &[Owner]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();

    for owner in owners {
        for (_, usages) in owner.lists() {
            for id in usages.iter().filter_map(|u| u.ingredient_id()) {
                *counts.entry(id.to_owned()).or_insert(0) += 1;
            }
        }
    }

    counts
}
