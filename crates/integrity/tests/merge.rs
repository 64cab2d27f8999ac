use antigravipizza_catalog::{Ingredient, IngredientUsage, store};
use antigravipizza_integrity::{IntegrityError, audit, similarity::Similarity};
use temp_dir::TempDir;

mod helpers;

#[tokio::test]
async fn test_merge_repoints_every_list_then_deletes() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;

    let mut pomodoro = helpers::create_ingredient(&catalog, "Pomodoro", "Verdure e Ortaggi").await?;
    let mut pelato = helpers::create_ingredient(&catalog, "Pomodoro pelato", "Verdure e Ortaggi").await?;
    let pomodori = helpers::create_ingredient(&catalog, "Pomodori", "Verdure e Ortaggi").await?;

    pomodoro.tags.insert("classic".to_owned());
    catalog.upsert_ingredient(&pomodoro).await?;
    pelato.tags.insert("base_rossa".to_owned());
    catalog.upsert_ingredient(&pelato).await?;

    let basilico = helpers::create_ingredient(&catalog, "Basilico", "Erbe e Spezie").await?;

    helpers::create_preparation(
        &catalog,
        "Salsa di pomodoro",
        vec![
            IngredientUsage::referenced(pelato.id.to_owned(), 400.0, "g"),
            IngredientUsage::referenced(basilico.id.to_owned(), 5.0, "g"),
            IngredientUsage::referenced(pomodoro.id.to_owned(), 100.0, "g").with_per_portion(25.0),
        ],
    )
    .await?;
    helpers::create_recipe(
        &catalog,
        "Marinara",
        vec![
            IngredientUsage::referenced(pomodori.id.to_owned(), 80.0, "g"),
            IngredientUsage::referenced(pomodoro.id.to_owned(), 60.0, "g"),
        ],
        vec![IngredientUsage::referenced(pomodori.id.to_owned(), 20.0, "g")],
    )
    .await?;

    let before = store::count_references(&catalog.load_owners().await?);
    let expected = before[&pomodoro.id] + before[&pelato.id] + before[&pomodori.id];

    let mut conn = catalog.pool().acquire().await?;
    let outcome = normalizer
        .merge_ingredients(
            &mut conn,
            &pomodoro.id,
            &[pelato.id.to_owned(), pomodori.id.to_owned()],
        )
        .await?;

    assert_eq!(outcome.repointed, 3);
    assert_eq!(outcome.owners_rewritten, 2);
    assert!(outcome.winner.tags.contains("classic"));
    assert!(outcome.winner.tags.contains("base_rossa"));

    let after = store::count_references(&catalog.load_owners().await?);
    assert_eq!(after[&pomodoro.id], expected);
    assert!(!after.contains_key(&pelato.id));
    assert!(!after.contains_key(&pomodori.id));
    assert_eq!(after[&basilico.id], 1);

    assert!(catalog.get_ingredient_by_id(&pelato.id).await?.is_none());
    assert!(catalog.get_ingredient_by_id(&pomodori.id).await?.is_none());

    let salsa = catalog.get_preparation_by_name("Salsa di pomodoro").await?.unwrap();
    assert_eq!(salsa.ingredients[0].quantity, Some(400.0));
    assert_eq!(salsa.ingredients[2].per_portion, Some(25.0));

    Ok(())
}

#[tokio::test]
async fn test_invalid_merge_changes_nothing() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;

    let brodo = helpers::create_ingredient(&catalog, "Brodo", "Basi e Salse").await?;
    let vegetale = helpers::create_ingredient(&catalog, "Brodo vegetale", "Basi e Salse").await?;
    helpers::create_preparation(
        &catalog,
        "Risotto",
        vec![IngredientUsage::referenced(vegetale.id.to_owned(), 500.0, "ml")],
    )
    .await?;

    let mut conn = catalog.pool().acquire().await?;

    let same = normalizer
        .merge_ingredients(&mut conn, &brodo.id, &[brodo.id.to_owned()])
        .await;
    assert!(matches!(same, Err(IntegrityError::InvalidMerge(_))));

    let missing = normalizer
        .merge_ingredients(&mut conn, &brodo.id, &[vegetale.id.to_owned(), "nope".to_owned()])
        .await;
    assert!(matches!(missing, Err(IntegrityError::IngredientNotFound { id }) if id == "nope"));

    let risotto = catalog.get_preparation_by_name("Risotto").await?.unwrap();
    assert_eq!(risotto.ingredients[0].ingredient_id(), Some(vegetale.id.as_str()));
    assert!(catalog.get_ingredient_by_id(&vegetale.id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_automatic_merge_needs_an_unambiguous_winner() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;
    let altro = helpers::category_id(&catalog, "Altro").await?;

    let mut olio = Ingredient::new("Olio EVO", altro.to_owned(), "ml");
    olio.date_added = 1_000;
    let mut spaced = Ingredient::new("Olio  EVO", altro.to_owned(), "ml");
    spaced.date_added = 1_000;
    catalog.upsert_ingredient(&olio).await?;
    catalog.upsert_ingredient(&spaced).await?;

    let brodo = helpers::create_ingredient(&catalog, "Brodo", "Basi e Salse").await?;
    let vegetale = helpers::create_ingredient(&catalog, "Brodo vegetale", "Basi e Salse").await?;

    let report = audit(&mut *catalog.pool().acquire().await?, normalizer.aliases()).await?;
    let kinds: Vec<Similarity> = report
        .duplicate_ingredient_names
        .iter()
        .map(|d| d.similarity)
        .collect();
    assert_eq!(kinds, vec![Similarity::Substring, Similarity::Equivalent]);
    assert!(report.duplicate_ingredient_names[1].suggested_winner.is_none());

    let mut conn = catalog.pool().acquire().await?;

    // substring similarity is a hint, never a merge
    let substring = normalizer
        .merge_equivalent(&mut conn, &[brodo.id.to_owned(), vegetale.id.to_owned()])
        .await;
    assert!(matches!(substring, Err(IntegrityError::AmbiguousMerge { .. })));

    let tie = normalizer
        .merge_equivalent(&mut conn, &[olio.id.to_owned(), spaced.id.to_owned()])
        .await;
    assert!(matches!(tie, Err(IntegrityError::AmbiguousMerge { .. })));

    helpers::create_preparation(
        &catalog,
        "Emulsione",
        vec![IngredientUsage::referenced(spaced.id.to_owned(), 30.0, "ml")],
    )
    .await?;

    let outcome = normalizer
        .merge_equivalent(&mut conn, &[olio.id.to_owned(), spaced.id.to_owned()])
        .await?;
    assert_eq!(outcome.winner.id, spaced.id);
    assert_eq!(outcome.removed, vec![olio.id.to_owned()]);
    assert_eq!(outcome.repointed, 0);

    Ok(())
}
