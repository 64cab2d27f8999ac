//! Seed and backup documents.
//!
//! The documents keep the historical wire shape: categories travel by name,
//! and the list-valued columns of a preparation or recipe (`ingredients`,
//! `instructions`, `tips`, ...) are JSON strings inside the JSON document.
//! Both levels are decoded on read, so callers only see typed records.

use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use sqlx::SqliteConnection;

use crate::{
    Category, CatalogResult, Difficulty, Ingredient, IngredientUsage, Phase, Preparation,
    PreparationUsage, Recipe, new_id, now_millis,
    store::{IngredientFilter, category, ingredient, preparation, recipe},
    usage::{lenient_bool, lenient_number},
};

pub const DOCUMENT_VERSION: &str = "1.0";

pub struct CategorySeed {
    pub name: &'static str,
    pub icon: &'static str,
    pub display_order: i64,
    pub description: &'static str,
}

pub const DEFAULT_CATEGORIES: [CategorySeed; 10] = [
    CategorySeed {
        name: "Impasti",
        icon: "🌾",
        display_order: 1,
        description: "Farine, lieviti, acqua, sale, olio per impasti",
    },
    CategorySeed {
        name: "Basi e Salse",
        icon: "🍅",
        display_order: 2,
        description: "Salse base, creme, condimenti liquidi",
    },
    CategorySeed {
        name: "Formaggi",
        icon: "🧀",
        display_order: 3,
        description: "Tutti i formaggi (freschi, stagionati, fusi)",
    },
    CategorySeed {
        name: "Latticini",
        icon: "🥛",
        display_order: 4,
        description: "Prodotti lattiero-caseari non formaggi",
    },
    CategorySeed {
        name: "Carni e Salumi",
        icon: "🥓",
        display_order: 5,
        description: "Carni fresche, salumi, affettati",
    },
    CategorySeed {
        name: "Pesce e Frutti di Mare",
        icon: "🐟",
        display_order: 6,
        description: "Pesce fresco, affumicato, conservato",
    },
    CategorySeed {
        name: "Verdure e Ortaggi",
        icon: "🥬",
        display_order: 7,
        description: "Verdure fresche, grigliate, sott'olio",
    },
    CategorySeed {
        name: "Erbe e Spezie",
        icon: "🌿",
        display_order: 8,
        description: "Aromi, spezie, erbe fresche e secche",
    },
    CategorySeed {
        name: "Frutta e Frutta Secca",
        icon: "🥜",
        display_order: 9,
        description: "Frutta fresca, secca, semi",
    },
    CategorySeed {
        name: "Altro",
        icon: "📦",
        display_order: 10,
        description: "Ingredienti speciali, miele, aceti, etc.",
    },
];

/// Inserts every default category whose name is not taken yet and returns
/// the ones created. Running it again creates nothing.
pub async fn seed_default_categories(conn: &mut SqliteConnection) -> CatalogResult<Vec<Category>> {
    let mut created = vec![];

    for seed in DEFAULT_CATEGORIES.iter() {
        if category::find_by_name(conn, seed.name).await?.is_some() {
            continue;
        }

        let value = Category {
            id: new_id(),
            name: seed.name.to_owned(),
            icon: seed.icon.to_owned(),
            display_order: seed.display_order,
            description: seed.description.to_owned(),
        };

        category::upsert(conn, &value).await?;
        tracing::debug!(name = seed.name, "category seeded");
        created.push(value);
    }

    Ok(created)
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_owned()
}

fn export_date() -> Option<String> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .ok()
}

/// A column value that is JSON text inside the document. A plain array is
/// accepted as well.
mod json_string {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
    use serde_json::Value;

    pub fn serialize<T: Serialize, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&raw)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: DeserializeOwned + Default,
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(T::default()),
            Some(Value::String(raw)) if raw.trim().is_empty() => Ok(T::default()),
            Some(Value::String(raw)) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
            Some(other) => serde_json::from_value(other).map_err(serde::de::Error::custom),
        }
    }
}

/// Usage lists decode element by element, so one bad entry becomes a
/// malformed usage instead of failing the whole document.
mod usage_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use crate::{
        IngredientUsage,
        usage::{decode_usages, encode_usages},
    };

    pub fn serialize<S: Serializer>(usages: &[IngredientUsage], serializer: S) -> Result<S::Ok, S::Error> {
        let raw = encode_usages(usages).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&raw)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<IngredientUsage>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => return Ok(vec![]),
            Some(Value::String(raw)) => raw,
            Some(other) => other.to_string(),
        };

        decode_usages(&raw).map_err(serde::de::Error::custom)
    }
}

mod string_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use crate::usage::decode_string_list;

    pub fn serialize<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        let raw = serde_json::to_string(values).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&raw)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => vec![],
            Some(Value::String(raw)) => decode_string_list(&raw),
            Some(other) => decode_string_list(&other.to_string()),
        })
    }
}

/// Accepts a string or a number (`30` and `"30 min"` both appear).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_weight: Option<f64>,
    #[serde(default)]
    pub default_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub post_bake: bool,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default, with = "string_list")]
    pub season: Vec<String>,
    #[serde(default, with = "string_list")]
    pub allergens: Vec<String>,
    #[serde(default, with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_custom: bool,
}

impl IngredientRecord {
    pub fn from_ingredient(ingredient: &Ingredient, category: Option<&str>) -> Self {
        Self {
            id: Some(ingredient.id.to_owned()),
            name: ingredient.name.to_owned(),
            category: category.map(str::to_owned),
            subcategory: ingredient.subcategory.to_owned(),
            min_weight: ingredient.min_weight,
            max_weight: ingredient.max_weight,
            default_unit: Some(ingredient.default_unit.to_owned()),
            post_bake: ingredient.post_bake,
            phase: Some(ingredient.phase.to_string()),
            season: ingredient.season.to_owned(),
            allergens: ingredient.allergens.to_owned(),
            tags: ingredient.tags.iter().cloned().collect(),
            is_custom: ingredient.is_custom,
        }
    }

    /// Builds the registry entry once the category name has been mapped to
    /// an id. Missing fields take the catalog defaults.
    pub fn into_ingredient(self, category_id: impl Into<String>, default_unit: &str) -> Ingredient {
        let mut ingredient = Ingredient::new(
            self.name,
            category_id,
            self.default_unit
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| default_unit.to_owned()),
        );

        if let Some(id) = self.id.filter(|id| !id.trim().is_empty()) {
            ingredient.id = id;
        }
        ingredient.subcategory = self.subcategory.filter(|s| !s.trim().is_empty());
        ingredient.min_weight = self.min_weight;
        ingredient.max_weight = self.max_weight;
        ingredient.post_bake = self.post_bake;
        ingredient.phase = self
            .phase
            .and_then(|p| Phase::from_str(p.trim()).ok())
            .unwrap_or_default();
        ingredient.season = self.season;
        ingredient.allergens = self.allergens;
        ingredient.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();
        ingredient.is_custom = self.is_custom;

        ingredient
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "yield", default, deserialize_with = "lenient_number")]
    pub portions: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, with = "usage_list")]
    pub ingredients: Vec<IngredientUsage>,
    #[serde(default, with = "string_list")]
    pub instructions: Vec<String>,
    #[serde(default, with = "string_list")]
    pub tips: Vec<String>,
    #[serde(default, with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_custom: bool,
}

impl PreparationRecord {
    pub fn from_preparation(preparation: &Preparation, category: Option<&str>) -> Self {
        Self {
            id: Some(preparation.id.to_owned()),
            name: preparation.name.to_owned(),
            category: category.map(str::to_owned),
            description: preparation.description.to_owned(),
            portions: Some(f64::from(preparation.portions)),
            prep_time: Some(preparation.prep_time.to_owned()).filter(|t| !t.is_empty()),
            difficulty: Some(preparation.difficulty.to_string()),
            ingredients: preparation.ingredients.to_owned(),
            instructions: preparation.instructions.to_owned(),
            tips: preparation.tips.to_owned(),
            tags: preparation.tags.iter().cloned().collect(),
            is_custom: preparation.is_custom,
        }
    }

    pub fn into_preparation(self, category_id: impl Into<String>) -> Preparation {
        Preparation {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_id),
            name: self.name.trim().to_owned(),
            category_id: category_id.into(),
            description: self.description,
            portions: self
                .portions
                .filter(|p| *p >= 1.0)
                .map(|p| p.round() as u32)
                .unwrap_or(4),
            prep_time: self.prep_time.unwrap_or_default(),
            difficulty: self
                .difficulty
                .and_then(|d| Difficulty::from_str(d.trim()).ok())
                .unwrap_or_default(),
            ingredients: self.ingredients,
            instructions: self.instructions,
            tips: self.tips,
            tags: self.tags.into_iter().collect(),
            is_custom: self.is_custom,
            date_added: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "usage_list")]
    pub base_ingredients: Vec<IngredientUsage>,
    #[serde(default, with = "json_string")]
    pub preparations: Vec<PreparationUsage>,
    #[serde(default, with = "usage_list")]
    pub toppings_during_bake: Vec<IngredientUsage>,
    #[serde(default, with = "usage_list")]
    pub toppings_post_bake: Vec<IngredientUsage>,
    #[serde(default, with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub archetype_used: Option<String>,
    #[serde(default)]
    pub recipe_source: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl From<&Recipe> for RecipeRecord {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: Some(recipe.id.to_owned()),
            name: recipe.name.to_owned(),
            description: recipe.description.to_owned(),
            base_ingredients: recipe.base_ingredients.to_owned(),
            preparations: recipe.preparations.to_owned(),
            toppings_during_bake: recipe.toppings_during_bake.to_owned(),
            toppings_post_bake: recipe.toppings_post_bake.to_owned(),
            tags: recipe.tags.iter().cloned().collect(),
            archetype_used: recipe.archetype_used.to_owned(),
            recipe_source: recipe.recipe_source.to_owned(),
            image_url: recipe.image_url.to_owned(),
            user_id: recipe.user_id.to_owned(),
            created_at: Some(recipe.created_at),
        }
    }
}

impl From<RecipeRecord> for Recipe {
    fn from(record: RecipeRecord) -> Self {
        Self {
            id: record
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_id),
            name: record.name.trim().to_owned(),
            description: record.description,
            base_ingredients: record.base_ingredients,
            preparations: record.preparations,
            toppings_during_bake: record.toppings_during_bake,
            toppings_post_bake: record.toppings_post_bake,
            tags: record.tags.into_iter().collect(),
            archetype_used: record.archetype_used,
            recipe_source: record.recipe_source,
            image_url: record.image_url,
            user_id: record.user_id,
            created_at: record.created_at.unwrap_or_else(now_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientsDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default)]
    pub count: usize,
    pub ingredients: Vec<IngredientRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationsDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default)]
    pub count: usize,
    pub preparations: Vec<PreparationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipesDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default)]
    pub count: usize,
    pub recipes: Vec<RecipeRecord>,
}

#[derive(Debug, Clone)]
pub enum SeedDocument {
    Ingredients(IngredientsDocument),
    Preparations(PreparationsDocument),
    Recipes(RecipesDocument),
}

impl SeedDocument {
    /// Picks the document kind from its top-level list key.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;

        let document = match &value {
            Value::Object(object) if object.contains_key("ingredients") => {
                SeedDocument::Ingredients(serde_json::from_value(value)?)
            }
            Value::Object(object) if object.contains_key("preparations") => {
                SeedDocument::Preparations(serde_json::from_value(value)?)
            }
            Value::Object(object) if object.contains_key("recipes") => {
                SeedDocument::Recipes(serde_json::from_value(value)?)
            }
            _ => {
                return Err(de::Error::custom(
                    "expected an ingredients, preparations or recipes document",
                ));
            }
        };

        Ok(document)
    }

    pub fn count(&self) -> usize {
        match self {
            SeedDocument::Ingredients(d) => d.ingredients.len(),
            SeedDocument::Preparations(d) => d.preparations.len(),
            SeedDocument::Recipes(d) => d.recipes.len(),
        }
    }
}

async fn category_index(conn: &mut SqliteConnection) -> CatalogResult<HashMap<String, Category>> {
    Ok(category::list(conn)
        .await?
        .into_iter()
        .map(|c| (c.id.to_owned(), c))
        .collect())
}

/// Ingredients grouped by category display order, then by name.
pub async fn export_ingredients(conn: &mut SqliteConnection) -> CatalogResult<IngredientsDocument> {
    let categories = category_index(conn).await?;
    let mut ingredients = ingredient::list(conn, &IngredientFilter::default()).await?;

    ingredients.sort_by_key(|i| {
        (
            categories
                .get(&i.category_id)
                .map(|c| c.display_order)
                .unwrap_or(i64::MAX),
            crate::name_key(&i.name),
        )
    });

    let records: Vec<IngredientRecord> = ingredients
        .iter()
        .map(|i| {
            IngredientRecord::from_ingredient(
                i,
                categories.get(&i.category_id).map(|c| c.name.as_str()),
            )
        })
        .collect();

    Ok(IngredientsDocument {
        version: default_version(),
        export_date: export_date(),
        count: records.len(),
        ingredients: records,
    })
}

pub async fn export_preparations(
    conn: &mut SqliteConnection,
) -> CatalogResult<PreparationsDocument> {
    let categories = category_index(conn).await?;
    let records: Vec<PreparationRecord> = preparation::list(conn)
        .await?
        .iter()
        .map(|p| {
            PreparationRecord::from_preparation(
                p,
                categories.get(&p.category_id).map(|c| c.name.as_str()),
            )
        })
        .collect();

    Ok(PreparationsDocument {
        version: default_version(),
        export_date: export_date(),
        count: records.len(),
        preparations: records,
    })
}

pub async fn export_recipes(conn: &mut SqliteConnection) -> CatalogResult<RecipesDocument> {
    let records: Vec<RecipeRecord> = recipe::list(conn)
        .await?
        .iter()
        .map(RecipeRecord::from)
        .collect();

    Ok(RecipesDocument {
        version: default_version(),
        export_date: export_date(),
        count: records.len(),
        recipes: records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UsageSource;

    #[test]
    fn test_preparation_ingredients_are_double_encoded() {
        let raw = r#"{
            "version": "1.0",
            "count": 1,
            "preparations": [{
                "name": "Crema di zucca",
                "category": "Creme",
                "yield": 4,
                "prepTime": "30 min",
                "difficulty": "Facile",
                "ingredients": "[{\"name\":\"Zucca\",\"quantity\":\"600\",\"unit\":\"g\",\"category\":\"Verdure\"},\"Sale\"]",
                "instructions": "[\"Tagliare la zucca\",\"Cuocere al vapore\"]",
                "tips": "[]",
                "isCustom": 0
            }]
        }"#;

        let SeedDocument::Preparations(document) = SeedDocument::parse(raw).unwrap() else {
            panic!("expected a preparations document");
        };
        let record = &document.preparations[0];

        assert_eq!(record.ingredients.len(), 2);
        assert_eq!(record.ingredients[0].quantity, Some(600.0));
        assert_eq!(
            record.ingredients[1].source,
            UsageSource::Embedded {
                name: "Sale".to_owned(),
                category: None
            }
        );
        assert_eq!(record.instructions.len(), 2);
        assert!(!record.is_custom);

        let encoded = serde_json::to_value(record).unwrap();
        assert!(encoded["ingredients"].is_string());
        let inner: Value = serde_json::from_str(encoded["ingredients"].as_str().unwrap()).unwrap();
        assert_eq!(inner[0]["name"], "Zucca");
    }

    #[test]
    fn test_ingredient_record_defaults() {
        let record: IngredientRecord = serde_json::from_str(
            r#"{"name":" Fior di latte ","category":"Formaggi","postBake":1,"phase":"topping","tags":"[\"veg\"]"}"#,
        )
        .unwrap();

        let ingredient = record.into_ingredient("cat-1", "g");
        assert_eq!(ingredient.name, "Fior di latte");
        assert_eq!(ingredient.default_unit, "g");
        assert!(ingredient.post_bake);
        assert_eq!(ingredient.phase, Phase::Topping);
        assert!(ingredient.tags.contains("veg"));
        assert!(!ingredient.id.is_empty());
    }

    #[test]
    fn test_unknown_document_shape_is_rejected() {
        assert!(SeedDocument::parse(r#"{"version":"1.0","pizzaNights":[]}"#).is_err());
        assert!(matches!(
            SeedDocument::parse(r#"{"recipes":[{"name":"Margherita","preparations":"[{\"id\":\"p1\",\"timing\":\"after\"}]"}]}"#),
            Ok(SeedDocument::Recipes(d)) if d.recipes[0].preparations[0].preparation_id == "p1"
        ));
    }
}
