//! Durable mapping from named carriage positions to calibrated step counts.
//!
//! The store is loaded once at startup and only read by the motion logic;
//! edits happen through `save`, which replaces the file atomically.

use crate::error::{MotionError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One dispensing station on the track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Optional numeric id, kept for callers that address stations by
    /// number rather than name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Unique, case-sensitive station name.
    pub name: String,
    /// Absolute step offset from the calibrated zero end stop.
    pub offset: i32,
    /// Free-form description, e.g. "bottle slot 3".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionsFile {
    positions: Vec<Position>,
}

#[derive(Debug, Default)]
pub struct PositionStore {
    positions: Vec<Position>,
}

impl PositionStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from in-memory positions, enforcing the invariants
    /// the file loader enforces.
    pub fn from_positions(positions: Vec<Position>) -> Result<Self> {
        for (i, p) in positions.iter().enumerate() {
            if p.name.is_empty() {
                return Err(MotionError::StoreUnavailable(format!(
                    "position {i} has an empty name"
                )));
            }
            if p.offset < 0 {
                return Err(MotionError::StoreUnavailable(format!(
                    "position '{}' has a negative offset ({})",
                    p.name, p.offset
                )));
            }
        }
        for (i, p) in positions.iter().enumerate() {
            if positions[..i].iter().any(|q| q.name == p.name) {
                return Err(MotionError::StoreUnavailable(format!(
                    "duplicate position name '{}'",
                    p.name
                )));
            }
            if let Some(id) = p.id
                && positions[..i].iter().any(|q| q.id == Some(id))
            {
                return Err(MotionError::StoreUnavailable(format!(
                    "duplicate position id {id}"
                )));
            }
        }
        Ok(Self { positions })
    }

    /// Parse the JSON document used on disk.
    pub fn from_json(s: &str) -> Result<Self> {
        let file: PositionsFile = serde_json::from_str(s)
            .map_err(|e| MotionError::StoreUnavailable(e.to_string()))?;
        Self::from_positions(file.positions)
    }

    /// Read the store from its backing file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MotionError::StoreUnavailable(format!("{}: {e}", path.display()))
        })?;
        let store = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            count = store.positions.len(),
            "positions loaded"
        );
        Ok(store)
    }

    /// Like `load`, but degrade to an empty store on failure so callers
    /// that can live without positions keep running.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "position store unavailable, continuing empty");
                Self::empty()
            }
        }
    }

    /// Exact-match lookup by name (case-sensitive), falling back to the
    /// numeric id when the identifier parses as one.
    pub fn resolve(&self, identifier: &str) -> Result<&Position> {
        if let Some(p) = self.positions.iter().find(|p| p.name == identifier) {
            return Ok(p);
        }
        if let Ok(id) = identifier.parse::<u32>()
            && let Some(p) = self.positions.iter().find(|p| p.id == Some(id))
        {
            return Ok(p);
        }
        Err(MotionError::NotFound(identifier.to_string()))
    }

    /// Replace the backing file atomically: the new content is written to
    /// a sibling temp file first, then renamed over the target, so a
    /// failed write never corrupts the previous content.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = PositionsFile {
            positions: self.positions.clone(),
        };
        let text = serde_json::to_string_pretty(&file)
            .map_err(|e| MotionError::StoreUnavailable(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|e| {
            MotionError::StoreUnavailable(format!("{}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            MotionError::StoreUnavailable(format!("{}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), count = self.positions.len(), "positions saved");
        Ok(())
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(name: &str, offset: i32) -> Position {
        Position {
            id: None,
            name: name.to_string(),
            offset,
            label: None,
        }
    }

    #[test]
    fn parses_positions_document() {
        let store = PositionStore::from_json(
            r#"{ "positions": [
                { "name": "gin", "offset": 450, "id": 1, "label": "bottle slot 1" },
                { "name": "tonic", "offset": 900 }
            ] }"#,
        )
        .expect("parse");
        assert_eq!(store.len(), 2);
        assert_eq!(store.resolve("gin").unwrap().offset, 450);
        assert_eq!(store.resolve("1").unwrap().name, "gin");
    }

    #[test]
    fn name_match_wins_over_numeric_id() {
        let store = PositionStore::from_positions(vec![
            Position {
                id: Some(7),
                name: "7".to_string(),
                offset: 10,
                label: None,
            },
            Position {
                id: Some(3),
                name: "rum".to_string(),
                offset: 20,
                label: None,
            },
        ])
        .expect("build");
        // "7" is a name first, an id second.
        assert_eq!(store.resolve("7").unwrap().offset, 10);
        assert_eq!(store.resolve("3").unwrap().name, "rum");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let store = PositionStore::from_positions(vec![pos("Gin", 450)]).expect("build");
        assert!(matches!(
            store.resolve("gin"),
            Err(MotionError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_document_is_store_unavailable() {
        for bad in [
            "not json",
            r#"{ "positions": [ { "offset": 5 } ] }"#,
            r#"{ "stations": [] }"#,
        ] {
            assert!(matches!(
                PositionStore::from_json(bad),
                Err(MotionError::StoreUnavailable(_))
            ));
        }
    }

    #[test]
    fn duplicate_names_and_negative_offsets_are_rejected() {
        let dup = PositionStore::from_positions(vec![pos("gin", 1), pos("gin", 2)]);
        assert!(matches!(dup, Err(MotionError::StoreUnavailable(_))));

        let neg = PositionStore::from_positions(vec![pos("gin", -5)]);
        assert!(matches!(neg, Err(MotionError::StoreUnavailable(_))));
    }

    #[test]
    fn load_or_empty_degrades_to_empty() {
        let store = PositionStore::load_or_empty(Path::new("/nonexistent/positions.json"));
        assert!(store.is_empty());
        assert!(matches!(
            store.resolve("anything"),
            Err(MotionError::NotFound(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.json");
        let store =
            PositionStore::from_positions(vec![pos("left", 0), pos("mid", 450), pos("right", 900)])
                .expect("build");
        store.save(&path).expect("save");
        // The temp file must not linger after the rename.
        assert!(!path.with_extension("tmp").exists());

        let loaded = PositionStore::load(&path).expect("load");
        assert_eq!(loaded.positions(), store.positions());
    }

    #[test]
    fn failed_save_keeps_previous_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.json");
        PositionStore::from_positions(vec![pos("gin", 450)])
            .unwrap()
            .save(&path)
            .expect("first save");

        // Writing into a directory that vanished fails without touching
        // the original file.
        let gone = dir.path().join("missing").join("positions.json");
        let err = PositionStore::from_positions(vec![pos("rum", 1)])
            .unwrap()
            .save(&gone)
            .expect_err("save into missing dir");
        assert!(matches!(err, MotionError::StoreUnavailable(_)));
        assert_eq!(PositionStore::load(&path).unwrap().len(), 1);
    }
}
