//! Read-only catalog scan producing a serializable defect report.
//!
//! Defects are collected, never raised: one corrupt record does not stop the
//! scan. Every list in the report has a stable order so the same catalog
//! state always serializes to the same document.

use std::collections::HashMap;

use antigravipizza_catalog::{
    Category, Ingredient, Owner, OwnerKind, Resolution, Resolver, UsageList, name_key,
    store::{self, category},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use strum::Display;

use crate::{
    IntegrityError, IntegrityResult,
    alias::CategoryAliases,
    instruction::{InstructionSignal, instruction_signal},
    similarity::{Similarity, similarity},
};

/// Where a usage sits. Field order is the report's sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLocation {
    pub owner_name: String,
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub list: UsageList,
    pub position: usize,
}

impl UsageLocation {
    pub fn new(owner: &Owner, list: UsageList, position: usize) -> Self {
        Self {
            owner_name: owner.name().to_owned(),
            owner_kind: owner.kind(),
            owner_id: owner.id().to_owned(),
            list,
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    #[serde(flatten)]
    pub location: UsageLocation,
    pub ingredient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DanglingReference {
    pub fn to_error(&self) -> IntegrityError {
        IntegrityError::DanglingReference {
            owner_kind: self.location.owner_kind,
            owner_id: self.location.owner_id.to_owned(),
            position: self.location.position,
            ingredient_id: self.ingredient_id.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedUsage {
    #[serde(flatten)]
    pub location: UsageLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// The uninterpreted keys of the broken record.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub raw: Map<String, Value>,
}

impl MalformedUsage {
    pub fn to_error(&self) -> IntegrityError {
        IntegrityError::MalformedUsage {
            owner_kind: self.location.owner_kind,
            owner_id: self.location.owner_id.to_owned(),
            position: self.location.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMember {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub references: usize,
    pub date_added: i64,
}

/// Two registry entries whose names look alike. Never merged automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCandidate {
    pub similarity: Similarity,
    pub first: DuplicateMember,
    pub second: DuplicateMember,
    /// Most referenced, then oldest. Absent when the two tie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMismatch {
    #[serde(flatten)]
    pub location: UsageLocation,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub legacy_category: String,
    pub actual_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedUsage {
    #[serde(flatten)]
    pub location: UsageLocation,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_category: Option<String>,
    /// Registry entry promotion would point at, if one has this name already.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_ingredient_id: Option<String>,
    /// Category a created entry would get.
    pub target_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingPreparation {
    pub recipe_name: String,
    pub recipe_id: String,
    pub position: usize,
    pub preparation_id: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Ingredient,
    Preparation,
    Recipe,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownCategory {
    pub name: String,
    pub entity: EntityKind,
    pub id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingField {
    pub name: String,
    pub entity: EntityKind,
    pub id: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectedInstruction {
    pub ingredient_id: String,
    pub name: String,
    pub signal: InstructionSignal,
    pub references: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub ingredients: usize,
    pub preparations: usize,
    pub recipes: usize,
    pub usages: usize,
    pub defects: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Report {
    pub dangling_references: Vec<DanglingReference>,
    pub malformed_usages: Vec<MalformedUsage>,
    pub duplicate_ingredient_names: Vec<DuplicateCandidate>,
    pub category_mismatches: Vec<CategoryMismatch>,
    pub embedded_unpromoted: Vec<EmbeddedUsage>,
    pub dangling_preparations: Vec<DanglingPreparation>,
    pub unknown_categories: Vec<UnknownCategory>,
    pub missing_fields: Vec<MissingField>,
    pub suspected_instructions: Vec<SuspectedInstruction>,
    pub summary: Summary,
}

impl Report {
    pub fn defect_count(&self) -> usize {
        self.dangling_references.len()
            + self.malformed_usages.len()
            + self.duplicate_ingredient_names.len()
            + self.category_mismatches.len()
            + self.embedded_unpromoted.len()
            + self.dangling_preparations.len()
            + self.unknown_categories.len()
            + self.missing_fields.len()
            + self.suspected_instructions.len()
    }

    pub fn is_clean(&self) -> bool {
        self.defect_count() == 0
    }
}

/// Scans the catalog behind `conn`. Reads only.
pub async fn audit(
    conn: &mut SqliteConnection,
    aliases: &CategoryAliases,
) -> IntegrityResult<Report> {
    let categories = category::list(conn).await?;
    let resolver = Resolver::load(conn).await?;
    let owners = store::load_owners(conn).await?;

    let report = build_report(&categories, &resolver, &owners, aliases);

    tracing::info!(
        owners = owners.len(),
        ingredients = resolver.len(),
        defects = report.summary.defects,
        "catalog audited"
    );

    Ok(report)
}

pub fn build_report(
    categories: &[Category],
    resolver: &Resolver,
    owners: &[Owner],
    aliases: &CategoryAliases,
) -> Report {
    let category_names: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let references = store::count_references(owners);
    let preparation_ids: Vec<&str> = owners
        .iter()
        .filter(|o| o.kind() == OwnerKind::Preparation)
        .map(Owner::id)
        .collect();

    let mut report = Report::default();

    for owner in owners {
        scan_usages(owner, resolver, &category_names, aliases, &mut report);
        scan_owner_fields(owner, &category_names, &preparation_ids, &mut report);
    }

    let ingredients = resolver.ingredients();

    for ingredient in &ingredients {
        scan_ingredient_fields(ingredient, &category_names, &references, &mut report);
    }

    report.duplicate_ingredient_names = duplicate_candidates(&ingredients, &references);

    report.dangling_references.sort_by(|a, b| a.location.cmp(&b.location));
    report.malformed_usages.sort_by(|a, b| a.location.cmp(&b.location));
    report.category_mismatches.sort_by(|a, b| a.location.cmp(&b.location));
    report.embedded_unpromoted.sort_by(|a, b| a.location.cmp(&b.location));
    report.dangling_preparations.sort();
    report.unknown_categories.sort();
    report.missing_fields.sort();
    report.suspected_instructions.sort_by(|a, b| {
        name_key(&a.name)
            .cmp(&name_key(&b.name))
            .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
    });

    report.summary = Summary {
        ingredients: resolver.len(),
        preparations: preparation_ids.len(),
        recipes: owners.len() - preparation_ids.len(),
        usages: owners.iter().map(Owner::usage_count).sum(),
        defects: report.defect_count(),
    };

    report
}

fn scan_usages(
    owner: &Owner,
    resolver: &Resolver,
    category_names: &HashMap<&str, &str>,
    aliases: &CategoryAliases,
    report: &mut Report,
) {
    for (list, usages) in owner.lists() {
        for (position, usage) in usages.iter().enumerate() {
            let location = || UsageLocation::new(owner, list, position);

            match resolver.resolve(usage) {
                Resolution::Resolved(ingredient) => {
                    let Some(legacy) = usage.legacy_category() else {
                        continue;
                    };
                    let Some(actual) = category_names.get(ingredient.category_id.as_str()) else {
                        continue;
                    };

                    if name_key(aliases.canonical_for(Some(legacy))) != name_key(actual) {
                        report.category_mismatches.push(CategoryMismatch {
                            location: location(),
                            ingredient_id: ingredient.id.to_owned(),
                            ingredient_name: ingredient.name.to_owned(),
                            legacy_category: legacy.to_owned(),
                            actual_category: (*actual).to_owned(),
                        });
                    }
                }
                Resolution::Embedded { name, category } => {
                    report.embedded_unpromoted.push(EmbeddedUsage {
                        location: location(),
                        name: name.to_owned(),
                        legacy_category: category.map(str::to_owned),
                        matching_ingredient_id: resolver.find_by_name(name).map(|i| i.id.to_owned()),
                        target_category: aliases.category_for(name, category).to_owned(),
                        quantity: usage.quantity,
                        unit: usage.unit.to_owned(),
                    });
                }
                Resolution::Dangling { ingredient_id } => {
                    let entry = DanglingReference {
                        location: location(),
                        ingredient_id: ingredient_id.to_owned(),
                        name: usage.label().map(str::to_owned),
                        quantity: usage.quantity,
                        unit: usage.unit.to_owned(),
                    };
                    tracing::warn!(owner = owner.name(), %list, "{}", entry.to_error());
                    report.dangling_references.push(entry);
                }
                Resolution::Malformed => {
                    let entry = MalformedUsage {
                        location: location(),
                        quantity: usage.quantity,
                        unit: usage.unit.to_owned(),
                        raw: usage.extra.to_owned(),
                    };
                    tracing::warn!(owner = owner.name(), %list, "{}", entry.to_error());
                    report.malformed_usages.push(entry);
                }
            }
        }
    }
}

fn scan_owner_fields(
    owner: &Owner,
    category_names: &HashMap<&str, &str>,
    preparation_ids: &[&str],
    report: &mut Report,
) {
    let missing = |entity: EntityKind, field: &str| MissingField {
        name: owner.name().to_owned(),
        entity,
        id: owner.id().to_owned(),
        field: field.to_owned(),
    };

    match owner {
        Owner::Preparation(p) => {
            if !category_names.contains_key(p.category_id.as_str()) {
                report.unknown_categories.push(UnknownCategory {
                    name: p.name.to_owned(),
                    entity: EntityKind::Preparation,
                    id: p.id.to_owned(),
                    category_id: p.category_id.to_owned(),
                });
            }
            if p.name.trim().is_empty() {
                report.missing_fields.push(missing(EntityKind::Preparation, "name"));
            }
            if p.ingredients.is_empty() {
                report.missing_fields.push(missing(EntityKind::Preparation, "ingredients"));
            }
            if p.instructions.iter().all(|i| i.trim().is_empty()) {
                report.missing_fields.push(missing(EntityKind::Preparation, "instructions"));
            }
        }
        Owner::Recipe(r) => {
            if r.name.trim().is_empty() {
                report.missing_fields.push(missing(EntityKind::Recipe, "name"));
            }
            if r.base_ingredients.is_empty() {
                report.missing_fields.push(missing(EntityKind::Recipe, "baseIngredients"));
            }

            for (position, usage) in r.preparations.iter().enumerate() {
                if !preparation_ids.contains(&usage.preparation_id.as_str()) {
                    report.dangling_preparations.push(DanglingPreparation {
                        recipe_name: r.name.to_owned(),
                        recipe_id: r.id.to_owned(),
                        position,
                        preparation_id: usage.preparation_id.to_owned(),
                    });
                }
            }
        }
    }
}

fn scan_ingredient_fields(
    ingredient: &Ingredient,
    category_names: &HashMap<&str, &str>,
    references: &HashMap<String, usize>,
    report: &mut Report,
) {
    if !category_names.contains_key(ingredient.category_id.as_str()) {
        report.unknown_categories.push(UnknownCategory {
            name: ingredient.name.to_owned(),
            entity: EntityKind::Ingredient,
            id: ingredient.id.to_owned(),
            category_id: ingredient.category_id.to_owned(),
        });
    }

    if ingredient.default_unit.trim().is_empty() {
        report.missing_fields.push(MissingField {
            name: ingredient.name.to_owned(),
            entity: EntityKind::Ingredient,
            id: ingredient.id.to_owned(),
            field: "defaultUnit".to_owned(),
        });
    }

    if let Some(signal) = instruction_signal(&ingredient.name) {
        report.suspected_instructions.push(SuspectedInstruction {
            ingredient_id: ingredient.id.to_owned(),
            name: ingredient.name.to_owned(),
            signal,
            references: references.get(&ingredient.id).copied().unwrap_or(0),
        });
    }
}

/// Pairs of similar names, each pair ordered by name and the list ordered by
/// the pair. `ingredients` must already be sorted by name.
fn duplicate_candidates(
    ingredients: &[&Ingredient],
    references: &HashMap<String, usize>,
) -> Vec<DuplicateCandidate> {
    let member = |i: &Ingredient| DuplicateMember {
        id: i.id.to_owned(),
        name: i.name.to_owned(),
        category_id: i.category_id.to_owned(),
        references: references.get(&i.id).copied().unwrap_or(0),
        date_added: i.date_added,
    };

    let mut candidates = vec![];

    for (i, a) in ingredients.iter().enumerate() {
        for b in &ingredients[i + 1..] {
            let Some(similarity) = similarity(&a.name, &b.name) else {
                continue;
            };

            let first = member(*a);
            let second = member(*b);
            let rank = |m: &DuplicateMember| (m.references, std::cmp::Reverse(m.date_added));
            let suggested_winner = match rank(&first).cmp(&rank(&second)) {
                std::cmp::Ordering::Greater => Some(first.id.to_owned()),
                std::cmp::Ordering::Less => Some(second.id.to_owned()),
                std::cmp::Ordering::Equal => None,
            };

            candidates.push(DuplicateCandidate {
                similarity,
                first,
                second,
                suggested_winner,
            });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use antigravipizza_catalog::{IngredientUsage, Preparation, Difficulty};

    use super::*;

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_owned(),
            name: name.to_owned(),
            icon: String::new(),
            display_order: 1,
            description: String::new(),
        }
    }

    fn ingredient(id: &str, name: &str, category_id: &str, date_added: i64) -> Ingredient {
        let mut ingredient = Ingredient::new(name, category_id, "g");
        ingredient.id = id.to_owned();
        ingredient.date_added = date_added;
        ingredient
    }

    fn preparation(id: &str, name: &str, ingredients: Vec<IngredientUsage>) -> Owner {
        Owner::Preparation(Preparation {
            id: id.to_owned(),
            name: name.to_owned(),
            category_id: "cat-basi".to_owned(),
            description: String::new(),
            portions: 4,
            prep_time: String::new(),
            difficulty: Difficulty::Media,
            ingredients,
            instructions: vec!["Mescolare".to_owned()],
            tips: vec![],
            tags: Default::default(),
            is_custom: false,
            date_added: 0,
        })
    }

    fn fixture() -> (Vec<Category>, Resolver) {
        let categories = vec![
            category("cat-basi", "Basi e Salse"),
            category("cat-frutta", "Frutta e Frutta Secca"),
            category("cat-verdure", "Verdure e Ortaggi"),
        ];
        let resolver = Resolver::new([
            ingredient("ing-pomodoro", "Pomodoro", "cat-verdure", 10),
            ingredient("ing-pomodoro-secco", "Pomodoro secco", "cat-verdure", 20),
            ingredient("ing-mango", "Mango", "cat-frutta", 30),
            ingredient("ing-mango-2", "mango ", "cat-frutta", 40),
        ]);

        (categories, resolver)
    }

    #[test]
    fn test_report_sections_and_order() {
        let (categories, resolver) = fixture();
        let aliases = CategoryAliases::builtin().unwrap();

        let mut stale = IngredientUsage::referenced("ing-pomodoro", 100.0, "g");
        if let antigravipizza_catalog::UsageSource::Referenced { stale_category, .. } =
            &mut stale.source
        {
            *stale_category = Some("Frutta".to_owned());
        }

        let owners = vec![
            preparation(
                "prep-b",
                "Salsa rosa",
                vec![
                    IngredientUsage::referenced("X", 30.0, "g"),
                    IngredientUsage::referenced("ing-mango", 50.0, "g"),
                    stale,
                ],
            ),
            preparation(
                "prep-a",
                "Crema di mango",
                vec![
                    IngredientUsage::embedded("Zucchero", Some("Dolci"), 20.0, "g"),
                    IngredientUsage::malformed(Map::new()),
                    IngredientUsage::referenced("Y", 1.0, "pz"),
                ],
            ),
        ];

        let report = build_report(&categories, &resolver, &owners, &aliases);

        let dangling: Vec<(&str, usize)> = report
            .dangling_references
            .iter()
            .map(|d| (d.location.owner_name.as_str(), d.location.position))
            .collect();
        assert_eq!(dangling, vec![("Crema di mango", 2), ("Salsa rosa", 0)]);

        assert_eq!(report.malformed_usages.len(), 1);
        assert_eq!(report.embedded_unpromoted.len(), 1);
        assert_eq!(report.embedded_unpromoted[0].target_category, "Altro");
        assert_eq!(report.category_mismatches.len(), 1);
        assert_eq!(report.category_mismatches[0].actual_category, "Verdure e Ortaggi");

        let pairs: Vec<(Similarity, &str, &str)> = report
            .duplicate_ingredient_names
            .iter()
            .map(|d| (d.similarity, d.first.name.as_str(), d.second.name.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Similarity::Equivalent, "Mango", "mango "),
                (Similarity::Substring, "Pomodoro", "Pomodoro secco"),
            ]
        );
        assert_eq!(
            report.duplicate_ingredient_names[0].suggested_winner.as_deref(),
            Some("ing-mango")
        );

        assert_eq!(report.summary.usages, 6);
        assert_eq!(report.summary.defects, report.defect_count());
    }

    #[test]
    fn test_audit_is_deterministic() {
        let (categories, resolver) = fixture();
        let aliases = CategoryAliases::builtin().unwrap();
        let owners = vec![preparation(
            "prep",
            "Pesto",
            vec![
                IngredientUsage::referenced("gone", 30.0, "g"),
                IngredientUsage::embedded("Basilico", None, 50.0, "g"),
            ],
        )];

        let first = serde_json::to_string(&build_report(&categories, &resolver, &owners, &aliases))
            .unwrap();
        let second =
            serde_json::to_string(&build_report(&categories, &resolver, &owners, &aliases))
                .unwrap();

        assert_eq!(first, second);

        let parsed: Report = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed.dangling_references[0].location.owner_id, "prep");
        assert!(first.contains(r#""danglingReferences""#));
        assert!(first.contains(r#""ownerKind":"preparation""#));
    }
}
