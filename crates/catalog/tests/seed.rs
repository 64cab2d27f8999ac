use antigravipizza_catalog::{
    IngredientUsage,
    seed::{self, DEFAULT_CATEGORIES, SeedDocument},
};
use temp_dir::TempDir;

mod helpers;

#[tokio::test]
async fn test_seed_default_categories_is_idempotent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let categories = catalog.list_categories().await?;
    assert_eq!(categories.len(), DEFAULT_CATEGORIES.len());
    assert_eq!(categories[0].name, "Impasti");
    assert_eq!(categories[9].name, "Altro");
    assert_eq!(categories[9].icon, "📦");

    let mut conn = catalog.pool().acquire().await?;
    let created = seed::seed_default_categories(&mut conn).await?;
    assert!(created.is_empty());
    assert_eq!(catalog.list_categories().await?.len(), DEFAULT_CATEGORIES.len());

    Ok(())
}

#[tokio::test]
async fn test_export_uses_seed_document_shape() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let rucola = helpers::create_ingredient(&catalog, "Rucola", "Verdure e Ortaggi").await?;
    helpers::create_ingredient(&catalog, "Farina 00", "Impasti").await?;
    let verdure = helpers::category_id(&catalog, "Verdure e Ortaggi").await?;

    catalog
        .upsert_preparation(&helpers::preparation(
            "Pesto di rucola",
            &verdure,
            vec![IngredientUsage::referenced(rucola.id.to_owned(), 80.0, "g")],
        ))
        .await?;

    let mut conn = catalog.pool().acquire().await?;

    let ingredients = seed::export_ingredients(&mut conn).await?;
    assert_eq!(ingredients.count, 2);
    assert_eq!(ingredients.ingredients[0].name, "Farina 00");
    assert_eq!(ingredients.ingredients[1].category.as_deref(), Some("Verdure e Ortaggi"));

    let preparations = seed::export_preparations(&mut conn).await?;
    let raw = serde_json::to_string(&preparations)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    assert!(value["preparations"][0]["ingredients"].is_string());
    assert_eq!(value["preparations"][0]["category"], "Verdure e Ortaggi");

    let SeedDocument::Preparations(parsed) = SeedDocument::parse(&raw)? else {
        panic!("expected a preparations document");
    };
    assert_eq!(
        parsed.preparations[0].ingredients[0].ingredient_id(),
        Some(rucola.id.as_str())
    );

    let recipes = seed::export_recipes(&mut conn).await?;
    assert_eq!(recipes.count, 0);

    Ok(())
}
