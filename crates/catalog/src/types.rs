use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantArray};
use validator::Validate;

use crate::usage::IngredientUsage;

/// Comparison key used for every name lookup: trimmed and lowercased.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Milliseconds since the unix epoch, the timestamp unit of every stored entity.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub icon: String,
    pub display_order: i64,
    pub description: String,
}

#[derive(
    EnumString,
    Display,
    VariantArray,
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Dough,
    #[default]
    Topping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category_id: String,
    pub subcategory: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub default_unit: String,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub post_bake: bool,
    pub phase: Phase,
    pub season: Vec<String>,
    pub allergens: Vec<String>,
    pub tags: BTreeSet<String>,
    pub is_custom: bool,
    pub date_added: i64,
}

impl Ingredient {
    /// A fresh, non-seed ingredient with the catalog defaults.
    pub fn new(
        name: impl Into<String>,
        category_id: impl Into<String>,
        default_unit: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into().trim().to_owned(),
            category_id: category_id.into(),
            subcategory: None,
            default_unit: default_unit.into(),
            min_weight: None,
            max_weight: None,
            post_bake: false,
            phase: Phase::default(),
            season: vec![],
            allergens: vec![],
            tags: BTreeSet::new(),
            is_custom: true,
            date_added: now_millis(),
        }
    }
}

#[derive(
    EnumString,
    Display,
    VariantArray,
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Difficulty {
    Facile,
    #[default]
    Media,
    Difficile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Preparation {
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category_id: String,
    pub description: String,
    #[serde(rename = "yield")]
    pub portions: u32,
    pub prep_time: String,
    pub difficulty: Difficulty,
    pub ingredients: Vec<IngredientUsage>,
    pub instructions: Vec<String>,
    pub tips: Vec<String>,
    pub tags: BTreeSet<String>,
    pub is_custom: bool,
    pub date_added: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BakeTiming {
    Before,
    After,
}

/// A recipe's use of a preparation, stored as `{ id, quantity, unit, timing }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationUsage {
    #[serde(rename = "id", alias = "preparationId")]
    pub preparation_id: String,
    #[serde(
        default,
        deserialize_with = "crate::usage::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<BakeTiming>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: String,
    pub base_ingredients: Vec<IngredientUsage>,
    pub preparations: Vec<PreparationUsage>,
    pub toppings_during_bake: Vec<IngredientUsage>,
    pub toppings_post_bake: Vec<IngredientUsage>,
    pub tags: BTreeSet<String>,
    pub archetype_used: Option<String>,
    pub recipe_source: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Option<String>,
    pub created_at: i64,
}

/// The entity kinds that own ingredient usage lists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OwnerKind {
    Preparation,
    Recipe,
}

/// Which usage list of an owner a usage lives in. The declaration order is
/// the order used when sorting report entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum UsageList {
    Ingredients,
    BaseIngredients,
    ToppingsDuringBake,
    ToppingsPostBake,
}

impl UsageList {
    pub fn of(kind: OwnerKind) -> &'static [UsageList] {
        match kind {
            OwnerKind::Preparation => &[UsageList::Ingredients],
            OwnerKind::Recipe => &[
                UsageList::BaseIngredients,
                UsageList::ToppingsDuringBake,
                UsageList::ToppingsPostBake,
            ],
        }
    }
}

/// A preparation or recipe loaded for usage-list work.
#[derive(Debug, Clone, PartialEq)]
pub enum Owner {
    Preparation(Preparation),
    Recipe(Recipe),
}

impl Owner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            Owner::Preparation(_) => OwnerKind::Preparation,
            Owner::Recipe(_) => OwnerKind::Recipe,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Owner::Preparation(p) => &p.id,
            Owner::Recipe(r) => &r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Owner::Preparation(p) => &p.name,
            Owner::Recipe(r) => &r.name,
        }
    }

    pub fn usages(&self, list: UsageList) -> Option<&Vec<IngredientUsage>> {
        match (self, list) {
            (Owner::Preparation(p), UsageList::Ingredients) => Some(&p.ingredients),
            (Owner::Recipe(r), UsageList::BaseIngredients) => Some(&r.base_ingredients),
            (Owner::Recipe(r), UsageList::ToppingsDuringBake) => Some(&r.toppings_during_bake),
            (Owner::Recipe(r), UsageList::ToppingsPostBake) => Some(&r.toppings_post_bake),
            _ => None,
        }
    }

    pub fn usages_mut(&mut self, list: UsageList) -> Option<&mut Vec<IngredientUsage>> {
        match (self, list) {
            (Owner::Preparation(p), UsageList::Ingredients) => Some(&mut p.ingredients),
            (Owner::Recipe(r), UsageList::BaseIngredients) => Some(&mut r.base_ingredients),
            (Owner::Recipe(r), UsageList::ToppingsDuringBake) => {
                Some(&mut r.toppings_during_bake)
            }
            (Owner::Recipe(r), UsageList::ToppingsPostBake) => Some(&mut r.toppings_post_bake),
            _ => None,
        }
    }

    /// Every usage list of the owner, in report order.
    pub fn lists(&self) -> impl Iterator<Item = (UsageList, &Vec<IngredientUsage>)> + '_ {
        UsageList::of(self.kind())
            .iter()
            .filter_map(|list| self.usages(*list).map(|usages| (*list, usages)))
    }

    pub fn lists_mut(&mut self) -> Vec<(UsageList, &mut Vec<IngredientUsage>)> {
        match self {
            Owner::Preparation(p) => vec![(UsageList::Ingredients, &mut p.ingredients)],
            Owner::Recipe(r) => vec![
                (UsageList::BaseIngredients, &mut r.base_ingredients),
                (UsageList::ToppingsDuringBake, &mut r.toppings_during_bake),
                (UsageList::ToppingsPostBake, &mut r.toppings_post_bake),
            ],
        }
    }

    pub fn usage_count(&self) -> usize {
        self.lists().map(|(_, usages)| usages.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_name_key_trims_and_lowercases() {
        assert_eq!(name_key("  Farina 00 "), "farina 00");
        assert_eq!(name_key("OLIO EVO"), "olio evo");
    }

    #[test]
    fn test_phase_and_difficulty_parse_legacy_spelling() {
        assert_eq!(Phase::from_str("dough").unwrap(), Phase::Dough);
        assert_eq!(Phase::from_str("Topping").unwrap(), Phase::Topping);
        assert_eq!(Phase::Dough.to_string(), "dough");
        assert_eq!(Difficulty::from_str("facile").unwrap(), Difficulty::Facile);
        assert_eq!(Difficulty::Difficile.to_string(), "Difficile");
    }

    #[test]
    fn test_preparation_usage_accepts_legacy_key() {
        let usage: PreparationUsage = serde_json::from_str(
            r#"{"preparationId":"p1","quantity":"80","unit":"g","timing":"after"}"#,
        )
        .unwrap();
        assert_eq!(usage.preparation_id, "p1");
        assert_eq!(usage.quantity, Some(80.0));
        assert_eq!(usage.timing, Some(BakeTiming::After));

        let encoded = serde_json::to_string(&usage).unwrap();
        assert!(encoded.contains(r#""id":"p1""#));
    }
}
