//! Palette descriptors: the payload handed from the element palette to the
//! canvas during a drag-and-drop (or a plain click).
//!
//! The payload crosses a trust boundary (it arrives as an opaque string on
//! the drag data transfer), so it is decoded into a closed schema and
//! validated here before anything reaches the store.

#[cfg(test)]
#[path = "palette_test.rs"]
mod palette_test;

use serde::{Deserialize, Serialize};

/// Palette category an element belongs to.
///
/// Serialized as its lowercase name. Names this build does not know are kept
/// verbatim in `Other` so saves from older or newer catalogs round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Computers, keyboards, phones, headphones.
    Electronics,
    /// Books, notebooks, stationery.
    Study,
    /// Small tools and gadgets.
    Tools,
    /// Everyday items (cups, plants, snacks).
    Daily,
    /// Any other category name, as stored.
    Other(String),
}

impl Category {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Electronics => "electronics",
            Self::Study => "study",
            Self::Tools => "tools",
            Self::Daily => "daily",
            Self::Other(name) => name,
        }
    }

    /// Whether this is one of the built-in palette categories.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        match name.as_str() {
            "electronics" => Self::Electronics,
            "study" => Self::Study,
            "tools" => Self::Tools,
            "daily" => Self::Daily,
            _ => Self::Other(name),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

/// Drop effect advertised while a palette item hovers over the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropEffect {
    /// The palette item is copied onto the canvas; the palette keeps it.
    #[default]
    Copy,
}

impl DropEffect {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
        }
    }
}

/// Errors raised while ingesting a palette payload.
#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("palette payload is not a valid descriptor: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("palette descriptor has an empty name")]
    MissingName,
    #[error("palette descriptor `{name}` has an empty icon reference")]
    MissingIcon { name: String },
    #[error("palette descriptor `{name}` has invalid depth {depth}")]
    InvalidDepth { name: String, depth: f64 },
}

/// Validated description of an item that can be placed on the desktop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    /// Display name.
    pub name: String,
    /// Opaque reference to the item's artwork.
    #[serde(rename = "icon")]
    pub icon_ref: String,
    /// Palette category, if the item has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Size class hint for the renderer.
    #[serde(default, rename = "size", skip_serializing_if = "Option::is_none")]
    pub size_class: Option<u32>,
    /// Cabinets get a deeper extrusion and a wood finish by default.
    #[serde(default)]
    pub is_cabinet: bool,
    /// Explicit extrusion depth overriding the cabinet-aware default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
}

impl ElementDescriptor {
    /// Build a minimal descriptor with just a name and icon.
    #[must_use]
    pub fn new(name: impl Into<String>, icon_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon_ref: icon_ref.into(),
            category: None,
            size_class: None,
            is_cabinet: false,
            depth: None,
        }
    }

    /// Decode and validate a serialized palette payload.
    ///
    /// # Errors
    ///
    /// Returns [`PaletteError`] when the payload is not JSON of the expected
    /// shape or fails validation.
    pub fn from_payload(payload: &str) -> Result<Self, PaletteError> {
        let descriptor: Self = serde_json::from_str(payload)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Serialize the descriptor for a drag data transfer.
    ///
    /// # Errors
    ///
    /// Returns [`PaletteError::Decode`] if serialization fails.
    pub fn to_payload(&self) -> Result<String, PaletteError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the invariants the store relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.name.trim().is_empty() {
            return Err(PaletteError::MissingName);
        }
        if self.icon_ref.trim().is_empty() {
            return Err(PaletteError::MissingIcon { name: self.name.clone() });
        }
        if let Some(depth) = self.depth {
            if !depth.is_finite() || depth <= 0.0 {
                return Err(PaletteError::InvalidDepth { name: self.name.clone(), depth });
            }
        }
        Ok(())
    }
}
