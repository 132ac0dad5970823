//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use wr_core::config::{self, RelayConfig};

fn resolve_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path.cloned().unwrap_or_else(config::default_config_path)
}

/// Get a config value by key
pub fn config_get(config_path: Option<&PathBuf>, key: &str) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_error(&format!("Config file not found: {:?}", path));
        print_info("Run 'wa-relay config init' to create one");
        return Ok(());
    }

    let table = read_table(&path)?;

    // Dotted path, e.g. "http.port"
    let mut current = &toml::Value::Table(table);
    for part in key.split('.') {
        match current.as_table().and_then(|t| t.get(part)) {
            Some(v) => current = v,
            None => {
                print_error(&format!("Key not found: {}", key));
                return Ok(());
            }
        }
    }

    match current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Integer(i) => println!("{}", i),
        toml::Value::Float(f) => println!("{}", f),
        toml::Value::Boolean(b) => println!("{}", b),
        toml::Value::Array(a) => {
            for item in a {
                println!("{}", item);
            }
        }
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(current)?),
        toml::Value::Datetime(d) => println!("{}", d),
    }

    Ok(())
}

/// Set a config value by key.
///
/// The file is only written if the result is still a valid relay config.
pub fn config_set(config_path: Option<&PathBuf>, key: &str, value: &str) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_info("Creating default configuration...");
        config_init(Some(&path), false)?;
    }

    let table = read_table(&path)?;

    // Digit-only phone numbers look like integers but belong in strings
    let parsed = parse_value(value);
    let fallback = (!parsed.is_str()).then(|| toml::Value::String(value.to_string()));

    let new_content = match with_value(&table, key, parsed) {
        Ok(content) => content,
        Err(e) => match fallback {
            Some(fallback) => with_value(&table, key, fallback).map_err(|_| e)?,
            None => return Err(e),
        },
    };

    std::fs::write(&path, new_content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'wa-relay config init' to create one. Defaults in effect:");
        println!();
        println!("{}", toml::to_string_pretty(&RelayConfig::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write the default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &RelayConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

/// Render `table` with `key` set to `value`, if the result is a valid config
fn with_value(table: &toml::Table, key: &str, value: toml::Value) -> Result<String> {
    let mut table = table.clone();

    let parts: Vec<&str> = key.split('.').collect();
    let (last_key, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: {:?}", key))?;

    let mut current = &mut table;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }
    let shown = value.to_string();
    current.insert(last_key.to_string(), value);

    let content = toml::to_string_pretty(&table)?;
    toml::from_str::<RelayConfig>(&content)
        .with_context(|| format!("Invalid value for {}: {}", key, shown))?;
    Ok(content)
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Interpret a command-line value as the TOML type it looks like
fn parse_value(value: &str) -> toml::Value {
    if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("3000"), toml::Value::Integer(3000));
        assert_eq!(parse_value("2.5"), toml::Value::Float(2.5));
        assert_eq!(
            parse_value("0.0.0.0"),
            toml::Value::String("0.0.0.0".to_string())
        );
    }

    #[test]
    fn test_set_creates_and_updates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        config_set(Some(&path), "http.port", "8080").unwrap();
        config_set(Some(&path), "pairing.phone_number", "201148795529").unwrap();

        let config: RelayConfig = config::load_config(&path).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.pairing.phone_number.as_deref(), Some("201148795529"));
        // Untouched sections keep their defaults
        assert_eq!(config.store.max_messages_per_chat, 50);
    }

    #[test]
    fn test_set_digit_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        config_init(Some(&path), false).unwrap();

        config_set(Some(&path), "pairing.owner_number", "201148795529").unwrap();
        config_set(Some(&path), "http.port", "4000").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("owner_number = \"201148795529\""));
        assert!(content.contains("port = 4000"));

        let config: RelayConfig = config::load_config(&path).unwrap();
        assert_eq!(config.pairing.owner_number.as_deref(), Some("201148795529"));
        assert_eq!(config.http.port, 4000);
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        config_init(Some(&path), false).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(config_set(Some(&path), "http.port", "not-a-port").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http]\nport = 1234\n").unwrap();

        config_init(Some(&path), false).unwrap();
        let config: RelayConfig = config::load_config(&path).unwrap();
        assert_eq!(config.http.port, 1234);

        config_init(Some(&path), true).unwrap();
        let config: RelayConfig = config::load_config(&path).unwrap();
        assert_eq!(config.http.port, 3000);
    }
}
