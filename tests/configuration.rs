//! Tests for configuration system

use antigravipizza::Config;
use antigravipizza::config::LogFormat;

#[test]
fn test_config_loads_from_default_toml() {
    let config = Config::load(None).expect("Failed to load config");

    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.observability.format, LogFormat::Pretty);
    assert_eq!(config.normalizer.fallback_category, "Altro");
    assert_eq!(config.normalizer.default_unit, "g");
    assert!(config.normalizer.aliases_path.is_none());
}

#[test]
fn test_config_is_valid() {
    let config = Config::load(None).expect("Failed to load config");

    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config =
        Config::load(Some("config/does-not-exist.toml".to_string())).expect("Failed to load config");

    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.observability.log_level, "info");
}
