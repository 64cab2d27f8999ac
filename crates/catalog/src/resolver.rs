//! Classifies an [`IngredientUsage`] against the ingredient registry.
//!
//! The resolver works on an in-memory snapshot of the registry so a full
//! catalog scan costs one query. Callers that create or delete ingredients
//! while iterating keep the snapshot current with [`Resolver::insert`] and
//! [`Resolver::remove`].

use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::{
    CatalogResult, Ingredient, IngredientUsage, UsageSource, name_key,
    store::{IngredientFilter, ingredient},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Resolved(&'a Ingredient),
    /// Inline name and the legacy category string it came with. The category
    /// is not authoritative.
    Embedded {
        name: &'a str,
        category: Option<&'a str>,
    },
    Dangling {
        ingredient_id: &'a str,
    },
    Malformed,
}

impl Resolution<'_> {
    pub fn is_defect(&self) -> bool {
        matches!(self, Resolution::Dangling { .. } | Resolution::Malformed)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Resolver {
    by_id: HashMap<String, Ingredient>,
    by_name: HashMap<String, String>,
}

impl Resolver {
    pub fn new(ingredients: impl IntoIterator<Item = Ingredient>) -> Self {
        let mut resolver = Self::default();
        for ingredient in ingredients {
            resolver.insert(ingredient);
        }

        resolver
    }

    pub async fn load(conn: &mut SqliteConnection) -> CatalogResult<Self> {
        let ingredients = ingredient::list(conn, &IngredientFilter::default()).await?;

        Ok(Self::new(ingredients))
    }

    /// Id first: a present id that does not resolve is dangling even when a
    /// name is also carried.
    pub fn resolve<'a>(&'a self, usage: &'a IngredientUsage) -> Resolution<'a> {
        match &usage.source {
            UsageSource::Referenced { ingredient_id, .. } => match self.by_id.get(ingredient_id) {
                Some(ingredient) => Resolution::Resolved(ingredient),
                None => Resolution::Dangling { ingredient_id },
            },
            UsageSource::Embedded { name, category } => Resolution::Embedded {
                name,
                category: category.as_deref(),
            },
            UsageSource::Malformed { .. } => Resolution::Malformed,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Ingredient> {
        self.by_id.get(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Ingredient> {
        self.by_name
            .get(&name_key(name))
            .and_then(|id| self.by_id.get(id))
    }

    pub fn insert(&mut self, ingredient: Ingredient) {
        if let Some(previous) = self.by_id.get(&ingredient.id) {
            self.by_name.remove(&name_key(&previous.name));
        }

        self.by_name
            .insert(name_key(&ingredient.name), ingredient.id.to_owned());
        self.by_id.insert(ingredient.id.to_owned(), ingredient);
    }

    pub fn remove(&mut self, id: &str) -> Option<Ingredient> {
        let ingredient = self.by_id.remove(id)?;
        self.by_name.remove(&name_key(&ingredient.name));

        Some(ingredient)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Registry entries ordered by name then id.
    pub fn ingredients(&self) -> Vec<&Ingredient> {
        let mut ingredients: Vec<&Ingredient> = self.by_id.values().collect();
        ingredients.sort_by(|a, b| {
            name_key(&a.name)
                .cmp(&name_key(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        ingredients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mozzarella() -> Ingredient {
        let mut ingredient = Ingredient::new("Mozzarella", "cat-formaggi", "g");
        ingredient.id = "ing-mozzarella".to_owned();
        ingredient
    }

    #[test]
    fn test_resolution_order() {
        let resolver = Resolver::new([mozzarella()]);

        let resolved = IngredientUsage::referenced("ing-mozzarella", 120.0, "g");
        assert!(matches!(
            resolver.resolve(&resolved),
            Resolution::Resolved(i) if i.name == "Mozzarella"
        ));

        let dangling = IngredientUsage::referenced("X", 10.0, "g");
        assert_eq!(
            resolver.resolve(&dangling),
            Resolution::Dangling { ingredient_id: "X" }
        );

        let embedded = IngredientUsage::embedded("Farina 00", Some("Impasto"), 500.0, "g");
        assert_eq!(
            resolver.resolve(&embedded),
            Resolution::Embedded {
                name: "Farina 00",
                category: Some("Impasto")
            }
        );

        let malformed = IngredientUsage::malformed(serde_json::Map::new());
        assert_eq!(resolver.resolve(&malformed), Resolution::Malformed);
        assert!(resolver.resolve(&malformed).is_defect());
    }

    #[test]
    fn test_name_index_follows_renames() {
        let mut resolver = Resolver::new([mozzarella()]);
        assert!(resolver.find_by_name("  MOZZARELLA ").is_some());

        let mut renamed = mozzarella();
        renamed.name = "Fior di latte".to_owned();
        resolver.insert(renamed);

        assert!(resolver.find_by_name("mozzarella").is_none());
        assert_eq!(
            resolver.find_by_name("fior di latte").map(|i| i.id.as_str()),
            Some("ing-mozzarella")
        );

        resolver.remove("ing-mozzarella");
        assert!(resolver.is_empty());
    }
}
