//! Export pipeline: rasterize the canvas surface into a downloadable PNG.
//!
//! DESIGN
//! ======
//! The pipeline never touches pixels itself. It hands the live render tree
//! to a [`RenderTarget`] together with [`CaptureOptions`]; the target clones
//! the tree, runs `on_clone` over the clone (color sanitization) and paints
//! it. Around that call the pipeline injects a watermark node into the live
//! tree and removes it again, and afterwards encodes the result as PNG and
//! passes it to a [`DownloadSink`].
//!
//! ERROR HANDLING
//! ==============
//! Both the watermark and the in-flight flag are scope guards, so they are
//! undone on every exit: success, a failed capture, or the export future
//! being dropped mid-await. A second export requested while one is running
//! is rejected with [`ExportError::Busy`] rather than queued.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use std::cell::Cell;
use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};

use crate::consts::{
    EXPORT_PREFIX, EXPORT_SCALE, EXPORT_TITLE, FALLBACK_BACKGROUND, FALLBACK_BORDER, FALLBACK_TEXT, WATERMARK_LABEL,
    WATERMARK_Z_INDEX,
};
use crate::geom::Rect;
use crate::scene::{NodeKind, RenderNode, Style};

/// Raster result produced by a [`RenderTarget`].
pub type RasterImage = RgbaImage;

/// Color functions the rasterizer cannot paint.
const UNSUPPORTED_COLOR_FUNCTIONS: [&str; 5] = ["oklch(", "oklab(", "lab(", "lch(", "color("];

/// Horizontal anchor of the watermark, as a percentage of surface width.
const WATERMARK_LEFT_PCT: f64 = 47.8;
const WATERMARK_TOP_PX: f64 = 34.0;
const WATERMARK_FONT_PX: f64 = 24.0;
const WATERMARK_COLOR: &str = "#222";

/// Errors reported by a render target.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("unsupported color value `{0}`")]
    UnsupportedColor(String),
    #[error("surface has no area ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },
    #[error("rasterization failed: {0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("canvas surface is not ready")]
    PreconditionFailed,
    #[error("an export is already in progress")]
    Busy,
    #[error("rasterization failed: {0}")]
    RasterizationFailed(#[source] RasterError),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("download failed: {0}")]
    Delivery(#[source] std::io::Error),
}

impl ExportError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PreconditionFailed => "E_NOT_READY",
            Self::Busy => "E_BUSY",
            Self::RasterizationFailed(_) => "E_RASTERIZE",
            Self::Encode(_) => "E_ENCODE",
            Self::Delivery(_) => "E_DELIVERY",
        }
    }

    /// Message shown to the user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PreconditionFailed => "桌面画布组件未准备好，请重试！",
            Self::Busy => "图片正在生成中，请稍候！",
            Self::RasterizationFailed(_) | Self::Encode(_) | Self::Delivery(_) => "导出图片失败，请稍后重试！",
        }
    }
}

/// Options passed to the rasterizer.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Device scale factor.
    pub scale: f64,
    /// Load cross-origin images.
    pub allow_cross_origin: bool,
    /// Allow images that taint the output.
    pub allow_taint: bool,
    /// Leave unpainted pixels transparent.
    pub transparent_background: bool,
    /// Applied by the target to its clone of the tree before painting.
    pub on_clone: fn(&mut RenderNode),
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: EXPORT_SCALE,
            allow_cross_origin: true,
            allow_taint: true,
            transparent_background: true,
            on_clone: sanitize_colors,
        }
    }
}

/// Something that can turn a render tree into pixels.
#[async_trait(?Send)]
pub trait RenderTarget {
    /// Rasterize `root`. Implementations must clone the tree and apply
    /// `options.on_clone` to the clone, leaving `root` untouched.
    async fn snapshot(&self, root: &RenderNode, options: &CaptureOptions) -> Result<RasterImage, RasterError>;
}

/// Destination of a finished export (a browser download, a file, ...).
pub trait DownloadSink {
    /// Deliver the encoded PNG under `filename`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if delivery fails.
    fn deliver(&self, filename: &str, png: &[u8]) -> std::io::Result<()>;
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

// =============================================================================
// COLOR SANITIZATION
// =============================================================================

/// Whether a resolved CSS color uses a model the rasterizer cannot paint.
#[must_use]
pub fn is_unsupported_color(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    UNSUPPORTED_COLOR_FUNCTIONS.iter().any(|f| lower.contains(f))
}

fn sanitize_channel(channel: &mut Option<String>, fallback: &str) {
    if channel.as_deref().is_some_and(is_unsupported_color) {
        *channel = Some(fallback.to_owned());
    }
}

/// Rewrite a single node's color channels, each independently.
pub fn sanitize_style(style: &mut Style) {
    sanitize_channel(&mut style.background, FALLBACK_BACKGROUND);
    sanitize_channel(&mut style.color, FALLBACK_TEXT);
    sanitize_channel(&mut style.border_color, FALLBACK_BORDER);
}

/// Rewrite every unsupported color in the tree to a paintable fallback.
pub fn sanitize_colors(root: &mut RenderNode) {
    root.walk_mut(&mut |node| sanitize_style(&mut node.style));
}

// =============================================================================
// WATERMARK
// =============================================================================

/// Text shown by the watermark for an identifier.
#[must_use]
pub fn watermark_text(identifier: &str) -> String {
    format!("{WATERMARK_LABEL}{identifier}")
}

/// Build the watermark node for a surface of the given width.
#[must_use]
pub fn watermark_node(identifier: &str, surface_width: f64) -> RenderNode {
    let text = watermark_text(identifier);
    // Rough box: one em per character, centered on the anchor.
    #[allow(clippy::cast_precision_loss)]
    let width = WATERMARK_FONT_PX * text.chars().count() as f64;
    let center_x = surface_width * WATERMARK_LEFT_PCT / 100.0;
    let mut node = RenderNode::new(
        NodeKind::Watermark,
        Rect::new(center_x - width / 2.0, WATERMARK_TOP_PX, width, WATERMARK_FONT_PX * 1.5),
    );
    node.z_index = WATERMARK_Z_INDEX;
    node.interactive = false;
    node.text = Some(text);
    node.style.color = Some(WATERMARK_COLOR.to_owned());
    node
}

/// Watermark injected into the live tree for the lifetime of the guard.
struct WatermarkGuard<'a> {
    root: &'a mut RenderNode,
    injected: bool,
}

impl<'a> WatermarkGuard<'a> {
    fn inject(root: &'a mut RenderNode, identifier: &str) -> Self {
        if identifier.is_empty() {
            return Self { root, injected: false };
        }
        let node = watermark_node(identifier, root.rect.width);
        root.children.push(node);
        Self { root, injected: true }
    }

    fn root(&self) -> &RenderNode {
        &*self.root
    }
}

impl Drop for WatermarkGuard<'_> {
    fn drop(&mut self) {
        if self.injected {
            self.root.children.retain(|n| n.kind != NodeKind::Watermark);
        }
    }
}

/// In-flight marker; clears the flag when dropped.
struct InFlight<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Result<Self, ExportError> {
        if flag.replace(true) {
            return Err(ExportError::Busy);
        }
        Ok(Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// =============================================================================
// FILENAME / DATE
// =============================================================================

/// Replace characters that are unsafe in a filename.
fn filename_safe(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect()
}

/// Download filename for an export taken on `date`.
#[must_use]
pub fn export_filename(identifier: &str, date: Date) -> String {
    let date_str = date
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string());
    let identifier = identifier.trim();
    if identifier.is_empty() {
        format!("{EXPORT_TITLE}_{date_str}.png")
    } else {
        format!("{EXPORT_PREFIX}_{}_{EXPORT_TITLE}_{date_str}.png", filename_safe(identifier))
    }
}

/// Today's date in the local time zone, or UTC if the offset is unknown.
#[must_use]
pub fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Encode a raster image as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder rejects the image.
pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Export pipeline bound to a render target and a download sink.
pub struct Exporter<R, D> {
    target: R,
    sink: D,
    options: CaptureOptions,
    in_flight: Cell<bool>,
}

impl<R: RenderTarget, D: DownloadSink> Exporter<R, D> {
    #[must_use]
    pub fn new(target: R, sink: D) -> Self {
        Self { target, sink, options: CaptureOptions::default(), in_flight: Cell::new(false) }
    }

    /// Whether an export is currently running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.get()
    }

    #[must_use]
    pub fn target(&self) -> &R {
        &self.target
    }

    #[must_use]
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Rasterize `surface`, watermark it with `identifier` and deliver the
    /// PNG to the sink.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Busy`] if another export is in flight.
    /// - [`ExportError::PreconditionFailed`] if `surface` is `None`.
    /// - [`ExportError::RasterizationFailed`] if the target fails; nothing is
    ///   delivered.
    /// - [`ExportError::Encode`] / [`ExportError::Delivery`] for the tail steps.
    pub async fn export(
        &self,
        surface: Option<&mut RenderNode>,
        identifier: &str,
        date: Date,
    ) -> Result<ExportArtifact, ExportError> {
        let _flight = InFlight::acquire(&self.in_flight).inspect_err(|_| {
            warn!("export requested while another is in flight");
        })?;

        let Some(surface) = surface else {
            warn!("export requested before the canvas surface is ready");
            return Err(ExportError::PreconditionFailed);
        };

        let identifier = identifier.trim();
        info!(identifier, scale = self.options.scale, "starting export");

        let captured = {
            let watermark = WatermarkGuard::inject(surface, identifier);
            self.target.snapshot(watermark.root(), &self.options).await
        };

        let image = captured.map_err(|e| {
            error!(error = %e, "rasterization failed");
            ExportError::RasterizationFailed(e)
        })?;

        let png = encode_png(&image)?;
        let filename = export_filename(identifier, date);
        self.sink.deliver(&filename, &png).map_err(|e| {
            error!(error = %e, %filename, "failed to deliver export");
            ExportError::Delivery(e)
        })?;

        info!(%filename, width = image.width(), height = image.height(), bytes = png.len(), "export complete");
        Ok(ExportArtifact { filename, png, width: image.width(), height: image.height() })
    }
}
