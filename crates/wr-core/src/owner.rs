//! Owner identity file

use std::path::Path;

use crate::error::ConfigError;

/// Read the owner numbers from a JSON array file.
///
/// Entries may be strings or numbers; everything but digits is stripped and
/// empty entries are dropped. A missing file yields an empty list.
pub fn load_owners(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read owner file {:?}: {}",
                path, e
            )))
        }
    };

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(&content).map_err(|source| ConfigError::OwnerFile {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            serde_json::Value::String(s) => Some(wr_protocol::digits_only(s)),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|n| !n.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mixed_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("owner.json");
        std::fs::write(&path, r#"["+20 114 879 5529", 15551234567, null, ""]"#).unwrap();

        let owners = load_owners(&path).unwrap();
        assert_eq!(owners, vec!["201148795529", "15551234567"]);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(load_owners(&temp.path().join("owner.json")).unwrap().is_empty());
    }

    #[test]
    fn test_not_an_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("owner.json");
        std::fs::write(&path, r#"{"owner": "1"}"#).unwrap();
        assert!(matches!(
            load_owners(&path),
            Err(ConfigError::OwnerFile { .. })
        ));
    }
}
