//! Persistence layer: scene snapshots in a single durable key-value slot.
//!
//! DESIGN
//! ======
//! A save serializes the whole scene (background, elements, identifier and
//! a timestamp) as JSON under [`STORAGE_KEY`], overwriting whatever was
//! there. A load reads the slot back and normalizes every element through
//! [`StoredElement`], which fills in fields older saves lack.
//!
//! ERROR HANDLING
//! ==============
//! A slot that fails to parse is logged and treated as "no saved scene";
//! the caller falls back to an empty desktop. Save failures are returned to
//! the caller.

#[cfg(test)]
#[path = "persist_test.rs"]
mod persist_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use uuid::Uuid;

use crate::consts::STORAGE_KEY;
use crate::doc::{PlacedElement, normalize_degrees, resolve_depth, resolve_material};
use crate::palette::Category;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("saved scene is corrupt: {0}")]
    SnapshotCorrupt(#[source] serde_json::Error),
    #[error("scene could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Durable string slots keyed by name.
pub trait KeyValueStore {
    /// Read the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backend cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;
}

/// Volatile key-value store, for tests and hosts without durable storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.slots.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Serializable representation of a whole desktop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Background reference.
    #[serde(default)]
    pub background: String,
    /// Elements in store order.
    #[serde(default)]
    pub elements: Vec<PlacedElement>,
    /// Dorm identifier used for the export filename and watermark.
    #[serde(default, rename = "dormNumber")]
    pub identifier: String,
    /// RFC 3339 time the snapshot was taken.
    #[serde(default)]
    pub timestamp: String,
}

impl SceneSnapshot {
    /// Serialize to the JSON stored in the slot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, PersistError> {
        serde_json::to_string(self).map_err(PersistError::Encode)
    }

    /// Parse a slot value, backfilling element defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::SnapshotCorrupt`] if the JSON does not parse.
    pub fn from_json(raw: &str) -> Result<Self, PersistError> {
        serde_json::from_str(raw).map_err(PersistError::SnapshotCorrupt)
    }
}

/// Current time as an RFC 3339 string.
#[must_use]
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Write the snapshot to the scene slot, overwriting any previous save.
///
/// # Errors
///
/// Returns [`PersistError`] when serialization or the backend write fails.
pub fn save(store: &mut dyn KeyValueStore, snapshot: &SceneSnapshot) -> Result<(), PersistError> {
    let raw = snapshot.to_json()?;
    store.set(STORAGE_KEY, &raw)?;
    info!(elements = snapshot.elements.len(), bytes = raw.len(), "scene saved");
    Ok(())
}

/// Read the scene slot.
///
/// # Errors
///
/// Returns [`PersistError::SnapshotCorrupt`] if the slot holds data that
/// does not parse, or a backend error if it cannot be read.
pub fn try_load(store: &dyn KeyValueStore) -> Result<Option<SceneSnapshot>, PersistError> {
    let Some(raw) = store.get(STORAGE_KEY)? else {
        return Ok(None);
    };
    SceneSnapshot::from_json(&raw).map(Some)
}

/// Read the scene slot, treating any failure as "no saved scene".
#[must_use]
pub fn load(store: &dyn KeyValueStore) -> Option<SceneSnapshot> {
    match try_load(store) {
        Ok(Some(snapshot)) => {
            info!(elements = snapshot.elements.len(), "scene loaded");
            Some(snapshot)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "failed to load saved scene; starting empty");
            None
        }
    }
}

/// Element id as found in a save. Older saves used numeric timestamps.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredId {
    Uuid(Uuid),
    Legacy(serde_json::Value),
}

/// Lenient on-disk shape of a placed element. Every optional field is
/// backfilled when converting into [`PlacedElement`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredElement {
    #[serde(default)]
    pub id: Option<StoredId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub z_index: Option<i64>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub is_cabinet: Option<bool>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub rotation_x: Option<f64>,
    #[serde(default)]
    pub rotation_y: Option<f64>,
    #[serde(default)]
    pub material: Option<String>,
}

impl From<StoredElement> for PlacedElement {
    fn from(s: StoredElement) -> Self {
        let is_cabinet = s.is_cabinet.unwrap_or(false);
        let id = match s.id {
            Some(StoredId::Uuid(id)) => id,
            Some(StoredId::Legacy(_)) | None => Uuid::new_v4(),
        };
        Self {
            id,
            name: s.name,
            icon_ref: s.icon,
            x: s.x,
            y: s.y,
            rotation: normalize_degrees(s.rotation),
            scale: s.scale.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(1.0),
            z_index: s.z_index.unwrap_or(1),
            size_class: s.size,
            category: s.category,
            is_cabinet,
            depth: resolve_depth(s.depth, is_cabinet),
            rotation_x: s.rotation_x.unwrap_or(0.0),
            rotation_y: s.rotation_y.unwrap_or(0.0),
            material: resolve_material(s.material.as_deref(), is_cabinet),
        }
    }
}
