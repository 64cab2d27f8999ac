//! Legacy category name to canonical category name.
//!
//! The table is a TOML resource read through the `config` crate. A copy ships
//! with the crate; operators point `normalizer.aliases_path` at their own file
//! to change the mapping without rebuilding.

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use antigravipizza_catalog::{Category, name_key, store::category};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::{IntegrityError, IntegrityResult};

const BUILTIN_TABLE: &str = include_str!("../category-aliases.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Alias {
    pub legacy: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameOverride {
    pub ingredient: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasTable {
    pub fallback: String,
    #[serde(default)]
    pub canonical: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub overrides: Vec<NameOverride>,
}

#[derive(Debug, Clone)]
pub struct CategoryAliases {
    fallback: String,
    canonical: HashMap<String, String>,
    aliases: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl CategoryAliases {
    pub fn builtin() -> IntegrityResult<Self> {
        Self::from_toml(BUILTIN_TABLE)
    }

    pub fn from_toml(raw: &str) -> IntegrityResult<Self> {
        let table = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize::<AliasTable>()?;

        Self::from_table(table)
    }

    pub fn from_path(path: &Path) -> IntegrityResult<Self> {
        let table = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()?
            .try_deserialize::<AliasTable>()?;

        Self::from_table(table)
    }

    /// The external table when a path is configured, the built-in one otherwise.
    pub fn load(path: Option<&Path>) -> IntegrityResult<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn from_table(table: AliasTable) -> IntegrityResult<Self> {
        let fallback = table.fallback.trim().to_owned();
        if fallback.is_empty() {
            return Err(ConfigError::Message("fallback category is blank".to_owned()).into());
        }

        let mut canonical: HashMap<String, String> = table
            .canonical
            .iter()
            .map(|name| (name_key(name), name.trim().to_owned()))
            .collect();
        canonical.insert(name_key(&fallback), fallback.to_owned());

        let aliases = table
            .aliases
            .into_iter()
            .map(|a| (name_key(&a.legacy), a.canonical.trim().to_owned()))
            .collect();

        let overrides = table
            .overrides
            .into_iter()
            .map(|o| (name_key(&o.ingredient), o.canonical.trim().to_owned()))
            .collect();

        Ok(Self {
            fallback,
            canonical,
            aliases,
            overrides,
        })
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        let fallback = fallback.trim();
        if !fallback.is_empty() {
            self.canonical
                .insert(name_key(fallback), fallback.to_owned());
            self.fallback = fallback.to_owned();
        }

        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Total mapping: explicit alias, then canonical pass-through, then the
    /// fallback. Matching ignores case and surrounding whitespace.
    pub fn canonical_for(&self, legacy: Option<&str>) -> &str {
        let Some(key) = legacy.map(name_key).filter(|k| !k.is_empty()) else {
            return &self.fallback;
        };

        self.aliases
            .get(&key)
            .or_else(|| self.canonical.get(&key))
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }

    /// Category for a new registry entry: a per-name override wins over the
    /// legacy category the usage carried.
    pub fn category_for(&self, ingredient_name: &str, legacy: Option<&str>) -> &str {
        match self.overrides.get(&name_key(ingredient_name)) {
            Some(canonical) => canonical.as_str(),
            None => self.canonical_for(legacy),
        }
    }

    /// Whether a legacy name maps without falling back.
    pub fn is_known(&self, legacy: &str) -> bool {
        let key = name_key(legacy);
        self.aliases.contains_key(&key) || self.canonical.contains_key(&key)
    }

    /// Every category name the table can produce.
    pub fn targets(&self) -> BTreeSet<&str> {
        self.canonical
            .values()
            .chain(self.aliases.values())
            .chain(self.overrides.values())
            .map(String::as_str)
            .collect()
    }

    /// Fails on the first target with no matching category.
    pub fn verify(&self, categories: &[Category]) -> IntegrityResult<()> {
        let existing: BTreeSet<String> = categories.iter().map(|c| name_key(&c.name)).collect();

        match self
            .targets()
            .into_iter()
            .find(|target| !existing.contains(&name_key(target)))
        {
            Some(missing) => Err(IntegrityError::CategoryNotFound {
                name: missing.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Looks up the category a mapped name points at. A missing target
    /// falls back; a missing fallback is fatal.
    pub async fn find_category(
        &self,
        conn: &mut SqliteConnection,
        canonical: &str,
    ) -> IntegrityResult<Category> {
        if let Some(found) = category::find_by_name(conn, canonical).await? {
            return Ok(found);
        }

        tracing::warn!(
            category = canonical,
            fallback = %self.fallback,
            "alias target missing, using fallback"
        );

        category::find_by_name(conn, &self.fallback)
            .await?
            .ok_or_else(|| IntegrityError::CategoryNotFound {
                name: self.fallback.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_legacy_names() {
        let aliases = CategoryAliases::builtin().unwrap();

        assert_eq!(aliases.canonical_for(Some("Carne")), "Carni e Salumi");
        assert_eq!(aliases.canonical_for(Some("verdure ")), "Verdure e Ortaggi");
        assert_eq!(aliases.canonical_for(Some("Impasto")), "Impasti");
        assert_eq!(aliases.canonical_for(Some("Formaggi")), "Formaggi");
        assert_eq!(aliases.canonical_for(Some("Pesce e Frutti di Mare")), "Pesce e Frutti di Mare");
        assert_eq!(aliases.canonical_for(Some("Spaziale")), "Altro");
        assert_eq!(aliases.canonical_for(None), "Altro");
        assert_eq!(aliases.canonical_for(Some("  ")), "Altro");
        assert!(!aliases.is_known("Spaziale"));
        assert!(aliases.is_known("croccante"));
    }

    #[test]
    fn test_name_override_wins() {
        let aliases = CategoryAliases::builtin().unwrap();

        assert_eq!(aliases.category_for("Noci", Some("Altro")), "Frutta e Frutta Secca");
        assert_eq!(aliases.category_for("sale", Some("Impasto")), "Erbe e Spezie");
        assert_eq!(aliases.category_for("Farina 00", Some("Impasto")), "Impasti");
        assert_eq!(aliases.category_for("Rucola", Some("Verdure")), "Verdure e Ortaggi");
    }

    #[test]
    fn test_external_table_and_fallback() {
        let aliases = CategoryAliases::from_toml(
            r#"
            fallback = "Varie"
            canonical = ["Formaggi"]

            [[aliases]]
            legacy = "Cheese"
            canonical = "Formaggi"
            "#,
        )
        .unwrap();

        assert_eq!(aliases.canonical_for(Some("cheese")), "Formaggi");
        assert_eq!(aliases.canonical_for(Some("Carne")), "Varie");
        assert_eq!(
            aliases.targets().into_iter().collect::<Vec<_>>(),
            vec!["Formaggi", "Varie"]
        );

        let aliases = aliases.with_fallback("Altro");
        assert_eq!(aliases.canonical_for(Some("Carne")), "Altro");

        assert!(CategoryAliases::from_toml(r#"fallback = " ""#).is_err());
    }

    #[test]
    fn test_verify_reports_missing_target() {
        let aliases = CategoryAliases::builtin().unwrap();
        let only_altro = vec![Category {
            id: "c1".to_owned(),
            name: "Altro".to_owned(),
            icon: "📦".to_owned(),
            display_order: 10,
            description: String::new(),
        }];

        assert!(matches!(
            aliases.verify(&only_altro),
            Err(IntegrityError::CategoryNotFound { .. })
        ));
    }
}
