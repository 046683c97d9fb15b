//! JSON-file configuration source.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use nvisy_bucket::ConfigSource;
use serde_json::Value;

/// Flat JSON object read as a scoped key-value source.
///
/// Non-string scalars are kept in their JSON text form, so `true` and `50`
/// parse the same as `"true"` and `"50"`.
#[derive(Debug, Clone, Default)]
pub struct JsonSource {
    values: BTreeMap<String, String>,
}

impl JsonSource {
    /// Reads and parses a JSON file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parses a flat JSON object.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(content)?;

        let values = raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key, s)),
                Value::Array(_) | Value::Object(_) => None,
                other => Some((key, other.to_string())),
            })
            .collect();

        Ok(Self { values })
    }

    /// Number of usable settings.
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl ConfigSource for JsonSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_stringified() {
        let source = JsonSource::from_json(
            r#"{"a.bucket_public_read": true, "a.bucket_page_size": 10, "a.bucket_name": "m", "a.x": null}"#,
        )
        .unwrap();

        assert_eq!(source.get("a.bucket_public_read").as_deref(), Some("true"));
        assert_eq!(source.get("a.bucket_page_size").as_deref(), Some("10"));
        assert_eq!(source.get("a.bucket_name").as_deref(), Some("m"));
        assert_eq!(source.get("a.x"), None);
        assert_eq!(source.len(), 3);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(JsonSource::from_json("[1, 2]").is_err());
    }
}
