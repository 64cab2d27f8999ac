#![allow(dead_code)]

use std::{collections::BTreeSet, path::PathBuf, str::FromStr};

use antigravipizza_catalog::{
    Catalog, Difficulty, Ingredient, IngredientUsage, Preparation, Recipe, new_id, now_millis,
    seed,
};
use antigravipizza_integrity::{CategoryAliases, Normalizer, RepairExecutor};
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use sqlx_migrator::{Migrate, Plan};

pub async fn setup_test_catalog(path: PathBuf) -> anyhow::Result<Catalog> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.to_str().unwrap()))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let mut conn = pool.acquire().await?;
    antigravipizza_db::migrator::<sqlx::Sqlite>()?
        .run(&mut conn, &Plan::apply_all())
        .await?;
    seed::seed_default_categories(&mut conn).await?;

    Ok(Catalog::new(pool))
}

pub fn normalizer() -> anyhow::Result<Normalizer> {
    Ok(Normalizer::new(CategoryAliases::builtin()?))
}

pub fn executor() -> anyhow::Result<RepairExecutor> {
    Ok(RepairExecutor::new(normalizer()?))
}

pub async fn category_id(catalog: &Catalog, name: &str) -> anyhow::Result<String> {
    Ok(catalog
        .get_category_by_name(name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("category {name} not seeded"))?
        .id)
}

pub async fn create_ingredient(
    catalog: &Catalog,
    name: &str,
    category: &str,
) -> anyhow::Result<Ingredient> {
    let ingredient = Ingredient::new(name, category_id(catalog, category).await?, "g");
    catalog.upsert_ingredient(&ingredient).await?;

    Ok(ingredient)
}

pub async fn create_preparation(
    catalog: &Catalog,
    name: &str,
    ingredients: Vec<IngredientUsage>,
) -> anyhow::Result<Preparation> {
    let preparation = Preparation {
        id: new_id(),
        name: name.to_owned(),
        category_id: category_id(catalog, "Basi e Salse").await?,
        description: String::new(),
        portions: 4,
        prep_time: "20 min".to_owned(),
        difficulty: Difficulty::Media,
        ingredients,
        instructions: vec!["Mescolare".to_owned()],
        tips: vec![],
        tags: BTreeSet::new(),
        is_custom: true,
        date_added: now_millis(),
    };
    catalog.upsert_preparation(&preparation).await?;

    Ok(preparation)
}

pub async fn create_recipe(
    catalog: &Catalog,
    name: &str,
    base_ingredients: Vec<IngredientUsage>,
    toppings_post_bake: Vec<IngredientUsage>,
) -> anyhow::Result<Recipe> {
    let recipe = Recipe {
        id: new_id(),
        name: name.to_owned(),
        description: String::new(),
        base_ingredients,
        preparations: vec![],
        toppings_during_bake: vec![],
        toppings_post_bake,
        tags: BTreeSet::new(),
        archetype_used: None,
        recipe_source: Some("manual".to_owned()),
        image_url: None,
        user_id: None,
        created_at: now_millis(),
    };
    catalog.upsert_recipe(&recipe).await?;

    Ok(recipe)
}

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);

    std::fs::read_to_string(path).unwrap()
}
