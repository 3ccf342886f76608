//! Integration tests for configuration loading

use price_bridge::config::{Config, ConfigError};
use price_bridge::providers::ProviderKind;
use price_bridge::router::{route, Route};
use std::io::Write;

#[test]
fn test_bundled_example_parses() {
    let config = Config::from_toml(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.provider.kind, ProviderKind::CryptoCompare);
    assert_eq!(route(&config), Route::Streaming);
}

#[test]
fn test_load_ncfx_file_with_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[provider]\nkind = \"ncfx\"").unwrap();

    let mut config = Config::load(file.path()).unwrap();
    assert!(config.validate().is_err());

    config
        .apply_env_overrides(|key| match key {
            "API_USERNAME" => Some("user".to_string()),
            "API_PASSWORD" => Some("secret-password".to_string()),
            _ => None,
        })
        .unwrap();
    assert!(config.validate().is_ok());
    assert!(!format!("{config:?}").contains("secret-password"));
}

#[test]
fn test_ncfx_rejects_polling() {
    let config = Config::from_toml(
        r#"
        [provider]
        kind = "ncfx"

        [ncfx]
        api_username = "user"
        api_password = "pass"
        ws_enabled = false
        "#,
    )
    .unwrap();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
