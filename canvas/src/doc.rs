//! Document model: placed desktop elements and the in-memory element store.
//!
//! This module defines the data type that describes what is on the desktop
//! (`PlacedElement`) and the runtime store that owns all live elements
//! (`DocStore`). Elements keep their insertion order, which is the tie-break
//! for equal `z_index` values when the renderer asks for paint order via
//! `sorted_elements`.
//!
//! Data flows into this layer from the palette (new elements), from the
//! interaction engine (moves, rotations, layering) and from a restored
//! snapshot (`load_snapshot`).

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{
    CABINET_DEPTH, DEFAULT_DEPTH, DUPLICATE_OFFSET_PX, MATERIAL_PLASTIC, MATERIAL_WOOD, PLACEMENT_FOOTPRINT_PX,
};
use crate::geom::{Point, Rect};
use crate::palette::{Category, ElementDescriptor};

/// Unique identifier for a placed element.
pub type ElementId = Uuid;

/// Size class assumed when the palette does not supply one.
const DEFAULT_SIZE_CLASS: u32 = 2;

/// One decorative item positioned on the desktop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "crate::persist::StoredElement")]
pub struct PlacedElement {
    /// Unique identifier within the store.
    pub id: ElementId,
    /// Display name.
    pub name: String,
    /// Opaque reference to the item's artwork.
    #[serde(rename = "icon")]
    pub icon_ref: String,
    /// Left edge in canvas pixels.
    pub x: f64,
    /// Top edge in canvas pixels.
    pub y: f64,
    /// Clockwise rotation in degrees, always in `[0, 360)`.
    pub rotation: f64,
    /// Uniform scale multiplier.
    pub scale: f64,
    /// Paint order; higher values are drawn on top.
    pub z_index: i64,
    /// Renderer size hint.
    #[serde(rename = "size", skip_serializing_if = "Option::is_none")]
    pub size_class: Option<u32>,
    /// Palette category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Whether the item is a cabinet.
    pub is_cabinet: bool,
    /// Pseudo-3D extrusion depth.
    pub depth: f64,
    /// Pseudo-3D tilt around the horizontal axis, in degrees.
    pub rotation_x: f64,
    /// Pseudo-3D tilt around the vertical axis, in degrees.
    pub rotation_y: f64,
    /// Surface material name (`"wood"`, `"plastic"`, ...).
    pub material: String,
}

impl PlacedElement {
    /// Top-left corner as a point.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Side length of the square hit box, scaled.
    #[must_use]
    pub fn extent(&self) -> f64 {
        PLACEMENT_FOOTPRINT_PX * self.scale
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if r >= 360.0 { 0.0 } else { r }
}

/// Resolve the extrusion depth in a single cabinet-aware decision: an
/// explicit positive depth wins, otherwise cabinets get 50 and everything
/// else 20.
#[must_use]
pub fn resolve_depth(explicit: Option<f64>, is_cabinet: bool) -> f64 {
    match explicit {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ if is_cabinet => CABINET_DEPTH,
        _ => DEFAULT_DEPTH,
    }
}

/// Default material for an element.
#[must_use]
pub fn default_material(is_cabinet: bool) -> &'static str {
    if is_cabinet { MATERIAL_WOOD } else { MATERIAL_PLASTIC }
}

/// Resolve the material, falling back to the cabinet-aware default when the
/// given one is missing or blank.
#[must_use]
pub fn resolve_material(explicit: Option<&str>, is_cabinet: bool) -> String {
    match explicit {
        Some(m) if !m.trim().is_empty() => m.to_owned(),
        _ => default_material(is_cabinet).to_owned(),
    }
}

/// In-memory store of placed elements, kept in insertion order.
#[derive(Debug, Default)]
pub struct DocStore {
    elements: Vec<PlacedElement>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { elements: Vec::new() }
    }

    /// The `z_index` given to the next inserted element: current size plus one.
    #[must_use]
    pub fn next_z_index(&self) -> i64 {
        i64::try_from(self.elements.len()).map_or(i64::MAX, |n| n.saturating_add(1))
    }

    /// Create a new element from a palette descriptor with its top-left
    /// corner at `at` (canvas-local), clamped to `bounds` with the placement
    /// footprint.
    pub fn add(&mut self, descriptor: &ElementDescriptor, at: Point, bounds: &Rect) -> PlacedElement {
        let pos = bounds.clamp(at, PLACEMENT_FOOTPRINT_PX);
        let element = PlacedElement {
            id: Uuid::new_v4(),
            name: descriptor.name.clone(),
            icon_ref: descriptor.icon_ref.clone(),
            x: pos.x,
            y: pos.y,
            rotation: 0.0,
            scale: 1.0,
            z_index: self.next_z_index(),
            size_class: Some(descriptor.size_class.unwrap_or(DEFAULT_SIZE_CLASS)),
            category: descriptor.category.clone(),
            is_cabinet: descriptor.is_cabinet,
            depth: resolve_depth(descriptor.depth, descriptor.is_cabinet),
            rotation_x: 0.0,
            rotation_y: 0.0,
            material: default_material(descriptor.is_cabinet).to_owned(),
        };
        self.elements.push(element.clone());
        element
    }

    /// Remove an element by id, returning it if it was present.
    pub fn remove(&mut self, id: &ElementId) -> Option<PlacedElement> {
        let idx = self.elements.iter().position(|e| e.id == *id)?;
        Some(self.elements.remove(idx))
    }

    /// Clone an element under a fresh id, offset by `(+20, +20)` and placed
    /// on top of the current count. The offset position is clamped to
    /// `bounds` with the placement footprint, so near the edge the copy moves
    /// less than the full offset. Returns `None` if `id` is absent.
    pub fn duplicate(&mut self, id: &ElementId, bounds: &Rect) -> Option<PlacedElement> {
        let source = self.get(id)?;
        let offset = Point::new(source.x + DUPLICATE_OFFSET_PX, source.y + DUPLICATE_OFFSET_PX);
        let pos = bounds.clamp(offset, PLACEMENT_FOOTPRINT_PX);
        let copy = PlacedElement {
            id: Uuid::new_v4(),
            x: pos.x,
            y: pos.y,
            z_index: self.next_z_index(),
            depth: resolve_depth(Some(source.depth), source.is_cabinet),
            material: resolve_material(Some(&source.material), source.is_cabinet),
            ..source.clone()
        };
        self.elements.push(copy.clone());
        Some(copy)
    }

    /// Remove every element. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.elements.len();
        self.elements.clear();
        n
    }

    /// Return a reference to an element by id.
    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&PlacedElement> {
        self.elements.iter().find(|e| e.id == *id)
    }

    /// Return a mutable reference to an element by id.
    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut PlacedElement> {
        self.elements.iter_mut().find(|e| e.id == *id)
    }

    /// Whether an element with this id exists.
    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.get(id).is_some()
    }

    /// All elements in insertion order.
    #[must_use]
    pub fn elements(&self) -> &[PlacedElement] {
        &self.elements
    }

    /// Replace all elements with a restored snapshot. Later entries whose id
    /// collides with an earlier one are re-keyed so ids stay unique.
    pub fn load_snapshot(&mut self, elements: Vec<PlacedElement>) {
        self.elements.clear();
        for mut element in elements {
            if self.contains(&element.id) {
                element.id = Uuid::new_v4();
            }
            self.elements.push(element);
        }
    }

    /// Return all elements in paint order: ascending `z_index`, ties by
    /// insertion order.
    #[must_use]
    pub fn sorted_elements(&self) -> Vec<&PlacedElement> {
        let mut elems: Vec<&PlacedElement> = self.elements.iter().collect();
        // Stable sort keeps insertion order for equal z.
        elems.sort_by_key(|e| e.z_index);
        elems
    }

    /// Highest `z_index` in the store, if any.
    #[must_use]
    pub fn max_z_index(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.z_index).max()
    }

    /// Lowest `z_index` in the store, if any.
    #[must_use]
    pub fn min_z_index(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.z_index).min()
    }

    /// Number of elements currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the store contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
