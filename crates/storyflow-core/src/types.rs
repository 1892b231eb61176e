use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// A string-keyed map whose lookups ignore ASCII/Unicode case
///
/// Keys are normalised to lowercase on every insert, lookup and removal.
/// The spelling used on the most recent insert is kept for iteration and
/// serialization, so `{"API_KEY": ..}` round-trips as `API_KEY`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseInsensitiveMap<V> {
    entries: HashMap<String, (String, V)>,
}

impl<V> CaseInsensitiveMap<V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    #[inline]
    fn normalize(key: &str) -> String {
        key.to_lowercase()
    }

    /// Insert a value, returning the previous value stored under any casing of `key`
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        self.entries
            .insert(Self::normalize(&key), (key, value))
            .map(|(_, previous)| previous)
    }

    /// Get a value by key, ignoring case
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&Self::normalize(key)).map(|(_, v)| v)
    }

    /// Check whether any casing of `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&Self::normalize(key))
    }

    /// Remove a value by key, ignoring case
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(&Self::normalize(key)).map(|(_, v)| v)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries with their original key spelling
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for CaseInsensitiveMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for CaseInsensitiveMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for CaseInsensitiveMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, V>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_ignores_case() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("Api_Key", json!("secret"));

        assert_eq!(map.get("API_KEY"), Some(&json!("secret")));
        assert_eq!(map.get("api_key"), Some(&json!("secret")));
        assert!(map.contains_key("aPi_KeY"));
        assert!(!map.contains_key("api"));
    }

    #[test]
    fn test_insert_overwrites_other_casing() {
        let mut map = CaseInsensitiveMap::new();
        assert!(map.insert("token", 1).is_none());
        assert_eq!(map.insert("TOKEN", 2), Some(1));

        assert_eq!(map.len(), 1);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["TOKEN"]);
    }

    #[test]
    fn test_remove_ignores_case() {
        let mut map: CaseInsensitiveMap<i32> = [("Region", 7)].into_iter().collect();
        assert_eq!(map.remove("REGION"), Some(7));
        assert!(map.is_empty());
    }

    #[test]
    fn test_serde_preserves_original_keys() {
        let map: CaseInsensitiveMap<serde_json::Value> =
            serde_json::from_value(json!({"DB_Host": "localhost"})).unwrap();
        assert_eq!(map.get("db_host"), Some(&json!("localhost")));

        let back = serde_json::to_value(&map).unwrap();
        assert_eq!(back, json!({"DB_Host": "localhost"}));
    }
}
