//! Index position to document ID mapping.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{RagError, Result};

/// Dense bijection between index positions `0..N-1` and document IDs.
///
/// Persisted as a JSON object with integer-string keys
/// (`{"0": "arxiv_2401.00001", "1": "blog_x"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    ids: Vec<String>,
}

impl PositionMap {
    /// Assign positions to `ids` in iteration order.
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    /// Document ID at `position`. Negative or out-of-range positions map to
    /// nothing.
    pub fn id_at(&self, position: i64) -> Option<&str> {
        usize::try_from(position).ok().and_then(|p| self.ids.get(p)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let object: BTreeMap<usize, &str> =
            self.ids.iter().enumerate().map(|(i, id)| (i, id.as_str())).collect();
        fs::write(path, serde_json::to_vec(&object)?)?;
        info!(path = %path.display(), entries = self.ids.len(), "saved position map");
        Ok(())
    }

    /// Load a mapping file. Keys must be exactly `0..N-1`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fail = |message: String| {
            RagError::startup("mapping", format!("{}: {message}", path.display()))
        };

        let bytes = fs::read(path).map_err(|e| fail(format!("cannot read: {e}")))?;
        let raw: BTreeMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| fail(format!("invalid mapping: {e}")))?;

        let mut object = BTreeMap::new();
        for (key, id) in raw {
            let position: usize = key
                .parse()
                .map_err(|_| fail(format!("key '{key}' is not a position")))?;
            // "00" and "+0" parse to 0 but would shadow the real entry.
            if position.to_string() != key {
                return Err(fail(format!("key '{key}' is not written as a plain integer")));
            }
            object.insert(position, id);
        }

        let mut ids = Vec::with_capacity(object.len());
        for (expected, (position, id)) in object.into_iter().enumerate() {
            if position != expected {
                return Err(fail(format!("positions are not dense: missing position {expected}")));
            }
            ids.push(id);
        }

        info!(path = %path.display(), entries = ids.len(), "loaded position map");
        Ok(Self { ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_handles_sentinel_and_out_of_range() {
        let map = PositionMap::from_ids(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(map.id_at(0), Some("a"));
        assert_eq!(map.id_at(1), Some("b"));
        assert_eq!(map.id_at(2), None);
        assert_eq!(map.id_at(crate::index::NO_MATCH), None);
    }

    #[test]
    fn file_uses_integer_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let ids: Vec<String> = (0..12).map(|i| format!("doc{i}")).collect();
        PositionMap::from_ids(ids.clone()).save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["10"], "doc10");

        let loaded = PositionMap::load(&path).unwrap();
        assert_eq!(loaded.ids().collect::<Vec<_>>(), ids);
    }

    #[test]
    fn gaps_in_positions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(&path, r#"{"0":"a","2":"c"}"#).unwrap();
        let err = PositionMap::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing position 1"));
    }

    #[test]
    fn non_canonical_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(&path, r#"{"0":"a","00":"b","1":"c"}"#).unwrap();
        let err = PositionMap::load(&path).unwrap_err();
        assert!(err.to_string().contains("'00'"), "{err}");
    }

    #[test]
    fn non_integer_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(&path, r#"{"zero":"a"}"#).unwrap();
        assert!(matches!(PositionMap::load(&path), Err(RagError::StartupFailure { .. })));
    }
}
