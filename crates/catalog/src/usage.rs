//! The ingredient usage value type embedded in preparations and recipes.
//!
//! Stored usage lists are JSON arrays inside a text column. They are decoded
//! into [`IngredientUsage`] at the store boundary and re-encoded only when an
//! owner is written back, so nothing above the store handles raw strings.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// How a usage identifies its ingredient.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageSource {
    /// Points into the ingredient registry. `stale_name`/`stale_category` are
    /// leftover denormalized labels; the registry entry is authoritative.
    Referenced {
        ingredient_id: String,
        stale_name: Option<String>,
        stale_category: Option<String>,
    },
    /// Carries its own name and legacy category instead of a reference.
    Embedded {
        name: String,
        category: Option<String>,
    },
    /// Neither an id nor a name: a corrupt record.
    Malformed { category: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "UsageRecord")]
pub struct IngredientUsage {
    pub source: UsageSource,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub per_portion: Option<f64>,
    /// Keys the usage carried that this model does not interpret (`phase`,
    /// `postBake`, ...). Written back untouched.
    pub extra: Map<String, Value>,
}

impl IngredientUsage {
    pub fn referenced(ingredient_id: impl Into<String>, quantity: f64, unit: &str) -> Self {
        Self {
            source: UsageSource::Referenced {
                ingredient_id: ingredient_id.into(),
                stale_name: None,
                stale_category: None,
            },
            quantity: Some(quantity),
            unit: Some(unit.to_owned()),
            per_portion: None,
            extra: Map::new(),
        }
    }

    pub fn embedded(
        name: impl Into<String>,
        category: Option<&str>,
        quantity: f64,
        unit: &str,
    ) -> Self {
        Self {
            source: UsageSource::Embedded {
                name: name.into(),
                category: category.map(str::to_owned),
            },
            quantity: Some(quantity),
            unit: Some(unit.to_owned()),
            per_portion: None,
            extra: Map::new(),
        }
    }

    pub fn malformed(extra: Map<String, Value>) -> Self {
        Self {
            source: UsageSource::Malformed { category: None },
            quantity: None,
            unit: None,
            per_portion: None,
            extra,
        }
    }

    pub fn with_per_portion(mut self, per_portion: f64) -> Self {
        self.per_portion = Some(per_portion);
        self
    }

    pub fn ingredient_id(&self) -> Option<&str> {
        match &self.source {
            UsageSource::Referenced { ingredient_id, .. } => Some(ingredient_id),
            _ => None,
        }
    }

    /// The usage's display name when it carries one inline.
    pub fn label(&self) -> Option<&str> {
        match &self.source {
            UsageSource::Referenced { stale_name, .. } => stale_name.as_deref(),
            UsageSource::Embedded { name, .. } => Some(name),
            UsageSource::Malformed { .. } => None,
        }
    }

    /// The denormalized category string, if the usage still carries one.
    pub fn legacy_category(&self) -> Option<&str> {
        match &self.source {
            UsageSource::Referenced { stale_category, .. } => stale_category.as_deref(),
            UsageSource::Embedded { category, .. } => category.as_deref(),
            UsageSource::Malformed { category } => category.as_deref(),
        }
    }

    /// Referenced form without leftover labels.
    pub fn is_canonical(&self) -> bool {
        matches!(
            &self.source,
            UsageSource::Referenced {
                stale_name: None,
                stale_category: None,
                ..
            }
        )
    }

    /// Same amounts, pointing at `ingredient_id`, with labels dropped.
    pub fn into_reference(self, ingredient_id: impl Into<String>) -> Self {
        Self {
            source: UsageSource::Referenced {
                ingredient_id: ingredient_id.into(),
                stale_name: None,
                stale_category: None,
            },
            ..self
        }
    }
}

const INGREDIENT_ID: &str = "ingredientId";
const NAME: &str = "name";
const CATEGORY: &str = "category";
const QUANTITY: &str = "quantity";
const UNIT: &str = "unit";
const PER_PORTION: &str = "perPortion";

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    ingredient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    per_portion: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Takes a non-blank text field out of `object`. Numbers are read as text
/// when `numbers` is set. A value that cannot be read goes back under its
/// key, so it is written out again untouched.
fn take_text(object: &mut Map<String, Value>, key: &str, numbers: bool) -> Option<String> {
    let value = object.remove(key)?;

    let text = match &value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) if numbers => Some(n.to_string()),
        Value::Null => return None,
        _ => None,
    };

    if text.is_none() {
        object.insert(key.to_owned(), value);
    }

    text
}

/// Same as [`take_text`] for amounts. `"150"` and `"1,5"` are read, `"q.b."`
/// stays raw.
fn take_number(object: &mut Map<String, Value>, key: &str) -> Option<f64> {
    let value = object.remove(key)?;

    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        Value::Null => return None,
        _ => None,
    };

    if number.is_none() {
        object.insert(key.to_owned(), value);
    }

    number
}

impl From<Map<String, Value>> for IngredientUsage {
    fn from(mut object: Map<String, Value>) -> Self {
        let ingredient_id = take_text(&mut object, INGREDIENT_ID, true);
        let name = take_text(&mut object, NAME, false);
        let category = take_text(&mut object, CATEGORY, false);

        let source = match (ingredient_id, name) {
            (Some(ingredient_id), name) => UsageSource::Referenced {
                ingredient_id,
                stale_name: name,
                stale_category: category,
            },
            (None, Some(name)) => UsageSource::Embedded { name, category },
            (None, None) => UsageSource::Malformed { category },
        };

        Self {
            source,
            quantity: take_number(&mut object, QUANTITY),
            unit: take_text(&mut object, UNIT, false),
            per_portion: take_number(&mut object, PER_PORTION),
            extra: object,
        }
    }
}

impl From<IngredientUsage> for UsageRecord {
    fn from(usage: IngredientUsage) -> Self {
        let (ingredient_id, name, category) = match usage.source {
            UsageSource::Referenced {
                ingredient_id,
                stale_name,
                stale_category,
            } => (Some(ingredient_id), stale_name, stale_category),
            UsageSource::Embedded { name, category } => (None, Some(name), category),
            UsageSource::Malformed { category } => (None, None, category),
        };

        // A typed value replaces the raw one kept under the same key.
        let mut extra = usage.extra;
        for (key, set) in [
            (INGREDIENT_ID, ingredient_id.is_some()),
            (NAME, name.is_some()),
            (CATEGORY, category.is_some()),
            (QUANTITY, usage.quantity.is_some()),
            (UNIT, usage.unit.is_some()),
            (PER_PORTION, usage.per_portion.is_some()),
        ] {
            if set {
                extra.remove(key);
            }
        }

        Self {
            ingredient_id,
            name,
            category,
            quantity: usage.quantity,
            unit: usage.unit,
            per_portion: usage.per_portion,
            extra,
        }
    }
}

/// Accepts a JSON number, a numeric string (`"150"`, `"1,5"`) or null.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
}

/// Accepts `true`/`false`, `0`/`1` or null.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

fn decode_element(value: Value) -> IngredientUsage {
    match value {
        Value::Object(object) => IngredientUsage::from(object),
        Value::String(name) if !name.trim().is_empty() => IngredientUsage {
            source: UsageSource::Embedded {
                name: name.trim().to_owned(),
                category: None,
            },
            quantity: None,
            unit: None,
            per_portion: None,
            extra: Map::new(),
        },
        other => {
            let mut extra = Map::new();
            extra.insert("value".to_owned(), other);
            IngredientUsage::malformed(extra)
        }
    }
}

/// Decodes a stored usage list. Elements that cannot be read become
/// [`UsageSource::Malformed`] entries at the same position; only a column
/// that is not a JSON array at all is an error.
pub fn decode_usages(raw: &str) -> Result<Vec<IngredientUsage>, serde_json::Error> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "null" {
        return Ok(vec![]);
    }

    let values: Vec<Value> = serde_json::from_str(raw)?;

    Ok(values.into_iter().map(decode_element).collect())
}

pub fn encode_usages(usages: &[IngredientUsage]) -> Result<String, serde_json::Error> {
    serde_json::to_string(usages)
}

/// Decodes a list of strings stored either as a JSON array or as plain text
/// (a single instruction paragraph, for instance).
pub fn decode_string_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "null" {
        return vec![];
    }

    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Err(_) => vec![raw.to_owned()],
    }
}

pub fn decode_tags(raw: &str) -> BTreeSet<String> {
    decode_string_list(raw)
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}
