//! Shared numeric and string constants for the canvas crate.

// ── Placement ───────────────────────────────────────────────────

/// Nominal element footprint used when placing new elements, in canvas pixels.
pub const PLACEMENT_FOOTPRINT_PX: f64 = 100.0;

/// Footprint used to clamp an element while it is being dragged.
pub const DRAG_FOOTPRINT_PX: f64 = 50.0;

/// Offset applied to both axes when duplicating an element.
pub const DUPLICATE_OFFSET_PX: f64 = 20.0;

// ── Pseudo-3D defaults ──────────────────────────────────────────

/// Extrusion depth for ordinary elements.
pub const DEFAULT_DEPTH: f64 = 20.0;

/// Extrusion depth for cabinets when none was supplied.
pub const CABINET_DEPTH: f64 = 50.0;

pub const MATERIAL_WOOD: &str = "wood";
pub const MATERIAL_PLASTIC: &str = "plastic";

// ── Persistence ─────────────────────────────────────────────────

/// Key of the single durable slot holding the saved scene.
pub const STORAGE_KEY: &str = "desktop-config";

// ── Export ──────────────────────────────────────────────────────

/// Device scale factor used when rasterizing for export.
pub const EXPORT_SCALE: f64 = 2.0;

/// Label prepended to the identifier in the export watermark.
pub const WATERMARK_LABEL: &str = "宿舍号：";

/// Paint order of the watermark overlay; above every element.
pub const WATERMARK_Z_INDEX: i64 = 9999;

/// Filename prefix used when an identifier is set.
pub const EXPORT_PREFIX: &str = "宿舍";

/// Fixed title segment of every export filename.
pub const EXPORT_TITLE: &str = "桌面设计";

/// Replacement for unsupported background colors (translucent white).
pub const FALLBACK_BACKGROUND: &str = "rgba(255, 255, 255, 0.1)";

/// Replacement for unsupported text colors.
pub const FALLBACK_TEXT: &str = "#333333";

/// Replacement for unsupported border colors.
pub const FALLBACK_BORDER: &str = "#cccccc";
