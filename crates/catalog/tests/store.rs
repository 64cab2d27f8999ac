use antigravipizza_catalog::{
    CatalogError, Ingredient, IngredientFilter, IngredientUsage, Phase, Resolution, UsageSource,
    store,
};
use temp_dir::TempDir;

mod helpers;

#[tokio::test]
async fn test_ingredient_lookup_by_id_and_name() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let mozzarella = helpers::create_ingredient(&catalog, "Mozzarella di bufala", "Formaggi").await?;

    let by_id = catalog.get_ingredient_by_id(&mozzarella.id).await?.unwrap();
    assert_eq!(by_id.name, "Mozzarella di bufala");

    let by_name = catalog
        .get_ingredient_by_name("  MOZZARELLA DI BUFALA ")
        .await?
        .unwrap();
    assert_eq!(by_name.id, mozzarella.id);

    assert!(catalog.get_ingredient_by_id("missing").await?.is_none());
    assert!(catalog.get_ingredient_by_name("Mozzarella").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_upsert_rejects_duplicate_name() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let basilico = helpers::create_ingredient(&catalog, "Basilico", "Erbe e Spezie").await?;
    let duplicate = Ingredient::new(" basilico", basilico.category_id.to_owned(), "g");

    match catalog.upsert_ingredient(&duplicate).await {
        Err(CatalogError::DuplicateName { existing_id, .. }) => {
            assert_eq!(existing_id, basilico.id)
        }
        other => panic!("expected DuplicateName, got {other:?}"),
    }

    let mut renamed = basilico.clone();
    renamed.name = "Basilico genovese".to_owned();
    renamed.tags.insert("fresh".to_owned());
    catalog.upsert_ingredient(&renamed).await?;

    let stored = catalog.get_ingredient_by_id(&basilico.id).await?.unwrap();
    assert_eq!(stored.name, "Basilico genovese");
    assert!(stored.tags.contains("fresh"));
    assert_eq!(catalog.list_ingredients(&IngredientFilter::default()).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_upsert_requires_existing_category() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let orphan = Ingredient::new("Tartufo", "no-such-category", "g");
    assert!(matches!(
        catalog.upsert_ingredient(&orphan).await,
        Err(CatalogError::NotFound { entity: "category", .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_list_ingredients_filters() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let impasti = helpers::category_id(&catalog, "Impasti").await?;
    let mut farina = Ingredient::new("Farina 00", impasti.to_owned(), "g");
    farina.phase = Phase::Dough;
    farina.tags.insert("base".to_owned());
    farina.is_custom = false;
    catalog.upsert_ingredient(&farina).await?;

    let mut semola = Ingredient::new("Semola rimacinata", impasti, "g");
    semola.phase = Phase::Dough;
    catalog.upsert_ingredient(&semola).await?;

    helpers::create_ingredient(&catalog, "Farina di castagne", "Frutta e Frutta Secca").await?;

    let by_name = catalog
        .list_ingredients(&IngredientFilter {
            name_contains: Some("FARINA".to_owned()),
            ..Default::default()
        })
        .await?;
    assert_eq!(by_name.len(), 2);
    assert_eq!(by_name[0].name, "Farina 00");

    let dough = catalog
        .list_ingredients(&IngredientFilter {
            phase: Some(Phase::Dough),
            custom_only: true,
            ..Default::default()
        })
        .await?;
    assert_eq!(dough.len(), 1);
    assert_eq!(dough[0].name, "Semola rimacinata");

    let tagged = catalog
        .list_ingredients(&IngredientFilter {
            tag: Some("base".to_owned()),
            ..Default::default()
        })
        .await?;
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, farina.id);

    Ok(())
}

#[tokio::test]
async fn test_name_filter_treats_like_wildcards_literally() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    helpers::create_ingredient(&catalog, "Farina 00", "Impasti").await?;
    helpers::create_ingredient(&catalog, "Sale fino", "Erbe e Spezie").await?;
    let oil = helpers::create_ingredient(&catalog, "Olio_evo 100%", "Altro").await?;

    for fragment in ["_", "%", "o_e", "100%"] {
        let found = catalog
            .list_ingredients(&IngredientFilter {
                name_contains: Some(fragment.to_owned()),
                ..Default::default()
            })
            .await?;
        assert_eq!(found.len(), 1, "fragment {fragment:?}");
        assert_eq!(found[0].id, oil.id);
    }

    let none = catalog
        .list_ingredients(&IngredientFilter {
            name_contains: Some("f_no".to_owned()),
            ..Default::default()
        })
        .await?;
    assert!(none.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_usage_lists_survive_storage() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let pomodoro = helpers::create_ingredient(&catalog, "Pomodoro San Marzano", "Basi e Salse").await?;
    let basi = helpers::category_id(&catalog, "Basi e Salse").await?;

    let preparation = helpers::preparation(
        "Salsa al pomodoro",
        &basi,
        vec![
            IngredientUsage::referenced(pomodoro.id.to_owned(), 400.0, "g").with_per_portion(100.0),
            IngredientUsage::embedded("Aglio", Some("Verdure"), 1.0, "spicchio"),
        ],
    );
    catalog.upsert_preparation(&preparation).await?;

    let stored = catalog.get_preparation_by_id(&preparation.id).await?.unwrap();
    assert_eq!(stored, preparation);

    let by_name = catalog.get_preparation_by_name("salsa al pomodoro").await?.unwrap();
    assert_eq!(by_name.id, preparation.id);

    let resolver = catalog.resolver().await?;
    assert!(matches!(
        resolver.resolve(&stored.ingredients[0]),
        Resolution::Resolved(i) if i.id == pomodoro.id
    ));
    assert!(matches!(
        resolver.resolve(&stored.ingredients[1]),
        Resolution::Embedded { name: "Aglio", category: Some("Verdure") }
    ));

    Ok(())
}

#[tokio::test]
async fn test_legacy_column_is_decoded_leniently() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let altro = helpers::category_id(&catalog, "Altro").await?;

    sqlx::query(
        "INSERT INTO preparation (id, name, category_id, ingredients, date_added) VALUES (?, ?, ?, ?, 0)",
    )
    .bind("legacy")
    .bind("Crema pasticcera")
    .bind(&altro)
    .bind(r#"["Uova", "Latte", {"quantity": 3}]"#)
    .execute(catalog.pool())
    .await?;

    let preparation = catalog.get_preparation_by_id("legacy").await?.unwrap();
    assert_eq!(preparation.ingredients.len(), 3);
    assert_eq!(preparation.ingredients[0].label(), Some("Uova"));
    assert!(matches!(
        preparation.ingredients[2].source,
        UsageSource::Malformed { .. }
    ));

    sqlx::query("UPDATE preparation SET ingredients = 'not json' WHERE id = 'legacy'")
        .execute(catalog.pool())
        .await?;
    assert!(matches!(
        catalog.get_preparation_by_id("legacy").await,
        Err(CatalogError::Decode { entity: "preparation", .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_delete_refuses_referenced_entities() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let origano = helpers::create_ingredient(&catalog, "Origano", "Erbe e Spezie").await?;
    let unused = helpers::create_ingredient(&catalog, "Maggiorana", "Erbe e Spezie").await?;

    let recipe = helpers::recipe(
        "Marinara",
        vec![IngredientUsage::referenced(origano.id.to_owned(), 2.0, "g")],
    );
    catalog.upsert_recipe(&recipe).await?;

    assert!(matches!(
        catalog.delete_ingredient(&origano.id).await,
        Err(CatalogError::IngredientInUse { references: 1, .. })
    ));
    assert!(matches!(
        catalog.delete_category(&origano.category_id).await,
        Err(CatalogError::CategoryInUse { ingredients: 2, .. })
    ));

    assert!(catalog.delete_ingredient(&unused.id).await?);
    assert!(!catalog.delete_ingredient(&unused.id).await?);

    assert!(catalog.delete_recipe(&recipe.id).await?);
    assert!(catalog.delete_ingredient(&origano.id).await?);

    Ok(())
}

#[tokio::test]
async fn test_reference_counts_cover_every_list() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;

    let olio = helpers::create_ingredient(&catalog, "Olio EVO", "Basi e Salse").await?;
    let basi = helpers::category_id(&catalog, "Basi e Salse").await?;

    catalog
        .upsert_preparation(&helpers::preparation(
            "Pesto",
            &basi,
            vec![IngredientUsage::referenced(olio.id.to_owned(), 50.0, "ml")],
        ))
        .await?;

    let mut recipe = helpers::recipe(
        "Focaccia",
        vec![IngredientUsage::referenced(olio.id.to_owned(), 30.0, "ml")],
    );
    recipe
        .toppings_post_bake
        .push(IngredientUsage::referenced(olio.id.to_owned(), 10.0, "ml"));
    catalog.upsert_recipe(&recipe).await?;

    let owners = catalog.load_owners().await?;
    assert_eq!(owners.len(), 2);
    assert_eq!(store::count_references(&owners).get(&olio.id), Some(&3));

    Ok(())
}
