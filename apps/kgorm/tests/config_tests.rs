//! Configuration file loading and schema extension.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use kgorm::{KgConfig, OrmError};
use kgorm_core::Scope;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const GADGET_SCHEMA: &str = r#"[{
    "class_name": "Gadget",
    "type_iri": "https://example.org/Gadget",
    "properties": [
        {"name": "serial", "types": ["string"], "path": "https://example.org/serial", "required": true},
        {"name": "maker", "types": ["Organization"], "path": "https://example.org/maker"}
    ],
    "default_space": "gadgets",
    "existence_fields": ["serial"]
}]"#;

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_file_settings_loaded() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "kgorm.toml",
        "host = \"https://kg.example.org/v3\"\nscope = \"any\"\ntimeout_secs = 5\npage_size = 25\n",
    );

    let config = KgConfig::load(Some(&path)).unwrap();

    assert_eq!(config.host, "https://kg.example.org/v3");
    assert_eq!(config.scope, Scope::Any);
    assert_eq!(config.timeout().as_secs(), 5);
    assert_eq!(config.page_size, 25);
    assert!(config.token.is_none());
}

#[test]
fn test_explicit_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(KgConfig::load(Some(&missing)), Err(OrmError::Io(_))));
}

#[test]
fn test_invalid_scope_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "kgorm.toml", "scope = \"draft\"\n");
    assert!(matches!(KgConfig::load(Some(&path)), Err(OrmError::Config(_))));
}

#[test]
fn test_schema_files_relative_to_config() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("schemas")).unwrap();
    write(&dir.path().join("schemas"), "gadget.json", GADGET_SCHEMA);
    let path = write(
        dir.path(),
        "kgorm.toml",
        "schema_files = [\"schemas/gadget.json\"]\n",
    );

    let config = KgConfig::load(Some(&path)).unwrap();
    assert_eq!(config.schema_files, vec![dir.path().join("schemas/gadget.json")]);

    let registry = config.registry().unwrap();
    let gadget = registry.get("Gadget").unwrap();
    assert_eq!(gadget.default_space.as_deref(), Some("gadgets"));
    assert!(registry.get("Person").is_ok());
}

#[test]
fn test_schema_with_unknown_target_rejected() {
    let dir = TempDir::new().unwrap();
    let schema = GADGET_SCHEMA.replace("\"Organization\"", "\"Factory\"");
    write(dir.path(), "gadget.json", &schema);
    let path = write(dir.path(), "kgorm.toml", "schema_files = [\"gadget.json\"]\n");

    let config = KgConfig::load(Some(&path)).unwrap();
    assert!(matches!(config.registry(), Err(OrmError::Model(_))));
}

#[test]
fn test_missing_schema_file() {
    let config = KgConfig {
        schema_files: vec!["/nonexistent/kgorm/schemas.json".into()],
        ..KgConfig::default()
    };
    assert!(matches!(config.registry(), Err(OrmError::Io(_))));
}

#[test]
fn test_env_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "kgorm.toml", "host = \"kg.example.org\"\ntoken = \"from-file\"\n");
    let mut config = KgConfig::load(Some(&path)).unwrap();

    config
        .apply_env(|key| match key {
            "KG_AUTH_TOKEN" => Some("from-env".to_string()),
            "KG_HOST" => Some("  ".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.token.as_deref(), Some("from-env"));
    assert_eq!(config.host, "kg.example.org");
}

#[test]
fn test_oversized_file_rejected() {
    let dir = TempDir::new().unwrap();
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    let path = write(dir.path(), "kgorm.toml", &padding);
    assert!(matches!(KgConfig::load(Some(&path)), Err(OrmError::Config(_))));
}
