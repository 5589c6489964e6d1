//! Store configuration and snapshots.
//!
//! A server renders with one store per request, serializes it with
//! [`Store::snapshot`](crate::Store::snapshot) and embeds the result in the
//! page under [`StoreConfig::data_key`]. The client builds its store from
//! the same config with [`StoreConfig::hydrate_from`], and every id-bearing
//! container and supplied token starts from the server's value instead of
//! its initial one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// Prefix of the global under which a store's snapshot is embedded.
pub const DATA_KEY_PREFIX: &str = "_weft_store_data_";

/// Serialized state of a store: `[[id, value], ...]`, in registration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<(String, Value)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `id`.
    pub fn insert<T: Serialize>(&mut self, id: impl Into<String>, value: &T) -> StoreResult<()> {
        self.push(id.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub(crate) fn push(&mut self, id: String, value: Value) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((id, value)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(id, value)| (id.as_str(), value))
    }

    pub fn to_json_string(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Distinguishes stores rendered into the same page.
    pub id: String,
    /// Values seeded into id-bearing tokens on first access.
    pub snapshot: Snapshot,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            snapshot: Snapshot::new(),
        }
    }
}

impl StoreConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Name of the global holding this store's snapshot.
    pub fn data_key(&self) -> String {
        format!("{DATA_KEY_PREFIX}{}", self.id)
    }

    /// Take the snapshot embedded under [`StoreConfig::data_key`] in
    /// `globals`. Leaves the config unchanged when there is none.
    pub fn hydrate_from(mut self, globals: &Map<String, Value>) -> StoreResult<Self> {
        if let Some(data) = globals.get(&self.data_key()) {
            self.snapshot = Snapshot::deserialize(data)?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_serializes_as_pairs() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("count", &3).unwrap();
        snapshot.insert("user", &json!({ "name": "ada" })).unwrap();
        snapshot.insert("count", &4).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.to_json_string().unwrap(),
            r#"[["count",4],["user",{"name":"ada"}]]"#
        );
    }

    #[test]
    fn snapshot_parses_from_json() {
        let snapshot = Snapshot::from_json_str(r#"[["count",7]]"#).unwrap();
        assert_eq!(snapshot.get("count"), Some(&json!(7)));
        assert!(snapshot.get("missing").is_none());
        assert!(Snapshot::from_json_str(r#"{"count":7}"#).is_err());
    }

    #[test]
    fn data_key_includes_store_id() {
        assert_eq!(StoreConfig::default().data_key(), "_weft_store_data_default");
        assert_eq!(StoreConfig::new("cart").data_key(), "_weft_store_data_cart");
    }

    #[test]
    fn hydrate_reads_matching_global() {
        let globals = json!({
            "_weft_store_data_cart": [["items", [1, 2]]],
            "_weft_store_data_other": [["items", [9]]],
        });
        let globals = globals.as_object().unwrap();

        let config = StoreConfig::new("cart").hydrate_from(globals).unwrap();
        assert_eq!(config.snapshot.get("items"), Some(&json!([1, 2])));

        let untouched = StoreConfig::new("missing").hydrate_from(globals).unwrap();
        assert!(untouched.snapshot.is_empty());
    }

    #[test]
    fn config_defaults_missing_fields() {
        let config: StoreConfig = serde_json::from_str(r#"{"id":"cart"}"#).unwrap();
        assert_eq!(config.id, "cart");
        assert!(config.snapshot.is_empty());

        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }
}
