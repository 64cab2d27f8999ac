use std::{env, path::Path};

use antigravipizza_integrity::{CategoryAliases, IntegrityResult, Normalizer};
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    /// External category alias table. The built-in table is used when unset.
    #[serde(default)]
    pub aliases_path: Option<String>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default = "default_unit")]
    pub default_unit: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            aliases_path: None,
            fallback_category: default_fallback_category(),
            default_unit: default_unit(),
        }
    }
}

fn default_fallback_category() -> String {
    "Altro".to_string()
}

fn default_unit() -> String {
    "g".to_string()
}

impl NormalizerConfig {
    pub fn build(&self) -> IntegrityResult<Normalizer> {
        let aliases = CategoryAliases::load(self.aliases_path.as_deref().map(Path::new))?
            .with_fallback(&self.fallback_category);

        Ok(Normalizer::new(aliases).with_default_unit(&self.default_unit))
    }
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (ANTIGRAVIPIZZA__DATABASE__URL, etc.)
    /// 2. Config file specified by path
    /// 3. Hardcoded defaults
    pub fn load(config_path: Option<String>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("database.url", "sqlite:antigravipizza.db")?
            .set_default("database.max_connections", 5)?;

        let config_file_path = config_path
            .or_else(|| env::var("CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if Path::new(&config_file_path).exists() {
            builder = builder.add_source(File::with_name(&config_file_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("ANTIGRAVIPIZZA")
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections < 1 {
            return Err("Database max_connections must be at least 1".to_string());
        }
        if self.normalizer.fallback_category.trim().is_empty() {
            return Err("Normalizer fallback_category must not be empty".to_string());
        }
        let unit = self.normalizer.default_unit.trim();
        if unit.is_empty() || unit.chars().count() > 20 {
            return Err("Normalizer default_unit must be 1 to 20 characters".to_string());
        }
        Ok(())
    }
}
