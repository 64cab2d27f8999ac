use std::collections::BTreeSet;

use antigravipizza_catalog::{
    IngredientFilter, UsageSource,
    seed::{self, SeedDocument},
};
use antigravipizza_integrity::{Session, import::import_document};
use temp_dir::TempDir;

mod helpers;

#[tokio::test]
async fn test_every_legacy_category_maps_to_a_seeded_category() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;
    let aliases = normalizer.aliases();

    let mut legacy = BTreeSet::new();

    let SeedDocument::Preparations(preparations) =
        SeedDocument::parse(&helpers::fixture("legacy-preparations.json"))?
    else {
        panic!("expected a preparations document");
    };
    for record in &preparations.preparations {
        legacy.extend(record.category.to_owned());
        legacy.extend(
            record
                .ingredients
                .iter()
                .filter_map(|u| u.legacy_category().map(str::to_owned)),
        );
    }

    let SeedDocument::Ingredients(ingredients) =
        SeedDocument::parse(&helpers::fixture("legacy-ingredients.json"))?
    else {
        panic!("expected an ingredients document");
    };
    legacy.extend(ingredients.ingredients.iter().filter_map(|r| r.category.to_owned()));

    assert!(legacy.len() > 15);

    let categories = catalog.list_categories().await?;
    aliases.verify(&categories)?;

    for name in &legacy {
        assert!(aliases.is_known(name), "{name} falls back silently");
        let canonical = aliases.canonical_for(Some(name));
        assert!(
            catalog.get_category_by_name(canonical).await?.is_some(),
            "{name} maps to missing {canonical}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_import_twice_updates_in_place() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;

    for _ in 0..2 {
        let document = SeedDocument::parse(&helpers::fixture("legacy-ingredients.json"))?;
        let mut session = Session::begin(catalog.pool(), false).await?;
        import_document(&mut session, &normalizer, document).await?;
        session.finish().await?;
    }

    let ingredients = catalog.list_ingredients(&IngredientFilter::default()).await?;
    assert_eq!(ingredients.len(), 6);

    let noci = catalog.get_ingredient_by_name("Noci").await?.unwrap();
    assert_eq!(
        noci.category_id,
        helpers::category_id(&catalog, "Frutta e Frutta Secca").await?
    );
    let prosciutto = catalog.get_ingredient_by_name("Prosciutto crudo").await?.unwrap();
    assert_eq!(
        prosciutto.category_id,
        helpers::category_id(&catalog, "Carni e Salumi").await?
    );
    assert!(prosciutto.post_bake);
    let mozzarella = catalog.get_ingredient_by_name("Mozzarella fior di latte").await?.unwrap();
    assert_eq!(mozzarella.max_weight, Some(150.0));
    assert_eq!(mozzarella.allergens, vec!["lattosio".to_owned()]);

    Ok(())
}

#[tokio::test]
async fn test_import_preparations_then_promote() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let catalog = helpers::setup_test_catalog(dir.child("db.sqlite3")).await?;
    let normalizer = helpers::normalizer()?;

    let document = SeedDocument::parse(&helpers::fixture("legacy-preparations.json"))?;
    let mut session = Session::begin(catalog.pool(), false).await?;
    let summary = import_document(&mut session, &normalizer, document).await?;
    let promoted = normalizer.normalize_catalog(&mut session).await?;
    session.finish().await?;

    assert_eq!(summary.created, 3);
    assert!(summary.failures.is_empty());
    assert_eq!(promoted.usages_promoted, 13);
    assert_eq!(promoted.ingredients_created, 13);

    let pesto = catalog.get_preparation_by_name("Pesto genovese").await?.unwrap();
    assert_eq!(pesto.id, "prep-pesto-genovese");
    assert_eq!(
        pesto.category_id,
        helpers::category_id(&catalog, "Basi e Salse").await?
    );
    assert!(pesto.ingredients.iter().all(|u| u.is_canonical()));
    assert_eq!(pesto.ingredients[3].extra["phase"], "topping");

    let crumble = catalog.get_preparation_by_name("Crumble di salame").await?.unwrap();
    assert_eq!(crumble.category_id, helpers::category_id(&catalog, "Altro").await?);

    let farina = catalog.get_ingredient_by_name("Farina 00").await?.unwrap();
    assert_eq!(farina.category_id, helpers::category_id(&catalog, "Impasti").await?);
    assert_eq!(
        crumble.ingredients[1].source,
        UsageSource::Referenced {
            ingredient_id: farina.id.to_owned(),
            stale_name: None,
            stale_category: None,
        }
    );

    let exported = seed::export_preparations(&mut *catalog.pool().acquire().await?).await?;
    assert_eq!(exported.count, 3);

    Ok(())
}
