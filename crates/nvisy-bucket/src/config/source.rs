//! Key-value configuration sources.

use std::collections::{BTreeMap, HashMap};

/// A key-value settings store the connector configuration is read from.
///
/// Keys are fully qualified with the connector scope, see [`config_path`].
pub trait ConfigSource {
    /// Returns the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// Builds the fully qualified key for `key` within `scope`.
///
/// An empty scope leaves the key unqualified.
pub fn config_path(scope: &str, key: &str) -> String {
    if scope.is_empty() {
        key.to_owned()
    } else {
        format!("{scope}.{key}")
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Reads configuration from process environment variables.
///
/// A key such as `uploads.bucket_name` is looked up as `UPLOADS_BUCKET_NAME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    /// Returns the environment variable name for a qualified key.
    pub fn var_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        assert_eq!(config_path("uploads", "bucket_name"), "uploads.bucket_name");
        assert_eq!(config_path("", "bucket_name"), "bucket_name");
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            EnvSource::var_name("uploads.bucket_name"),
            "UPLOADS_BUCKET_NAME"
        );
        assert_eq!(
            EnvSource::var_name("user-avatars.bucket_region"),
            "USER_AVATARS_BUCKET_REGION"
        );
    }

    #[test]
    fn test_map_sources() {
        let mut hash = HashMap::new();
        hash.insert("a.bucket_name".to_owned(), "one".to_owned());
        assert_eq!(ConfigSource::get(&hash, "a.bucket_name").as_deref(), Some("one"));
        assert_eq!(ConfigSource::get(&hash, "b.bucket_name"), None);

        let mut tree = BTreeMap::new();
        tree.insert("a.bucket_name".to_owned(), "two".to_owned());
        assert_eq!(ConfigSource::get(&tree, "a.bucket_name").as_deref(), Some("two"));
    }
}
