//! Software rasterizer for headless export.
//!
//! DESIGN
//! ======
//! Paints a render tree into an `image::RgbaImage` without a browser. Each
//! node is a (possibly rotated) box: its background fills the box, its border
//! color draws a one-unit frame, and children paint on top in `z_index`
//! order relative to the parent's origin. Image references are not fetched.
//! Glyphs are not shaped; text on an image-less node is drawn as a solid bar
//! in its color so the placement is visible in the output.
//!
//! ERROR HANDLING
//! ==============
//! A color the parser does not understand fails the whole render with
//! `RasterError::UnsupportedColor`. Wide-gamut color functions are expected
//! to be rewritten by the capture hook before painting.

use async_trait::async_trait;
use canvas::export::{CaptureOptions, RasterError, RasterImage, RenderTarget};
use canvas::scene::RenderNode;
use image::Rgba;
use tracing::debug;

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fraction of a text node's height covered by its placeholder bar.
const TEXT_BAR_RATIO: f64 = 0.4;

// =============================================================================
// COLORS
// =============================================================================

/// Parse a CSS color in the forms the render tree carries: `#rgb`, `#rgba`,
/// `#rrggbb`, `#rrggbbaa`, `rgb(...)`, `rgba(...)`, `transparent`, `white`,
/// `black`.
///
/// # Errors
///
/// Returns [`RasterError::UnsupportedColor`] for anything else.
pub fn parse_color(value: &str) -> Result<Rgba<u8>, RasterError> {
    let unsupported = || RasterError::UnsupportedColor(value.to_owned());
    let v = value.trim().to_ascii_lowercase();
    match v.as_str() {
        "transparent" => return Ok(TRANSPARENT),
        "white" => return Ok(WHITE),
        "black" => return Ok(Rgba([0, 0, 0, 255])),
        _ => {}
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(unsupported);
    }
    let args = v
        .strip_prefix("rgba(")
        .or_else(|| v.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(unsupported)?;
    parse_rgb_args(args).ok_or_else(unsupported)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    let rgba = match hex.len() {
        3 => [nibble(0), nibble(1), nibble(2), Ok(255)],
        4 => [nibble(0), nibble(1), nibble(2), nibble(3)],
        6 => [byte(0), byte(2), byte(4), Ok(255)],
        8 => [byte(0), byte(2), byte(4), byte(6)],
        _ => return None,
    };
    let mut out = [0u8; 4];
    for (slot, channel) in out.iter_mut().zip(rgba) {
        *slot = channel.ok()?;
    }
    Some(Rgba(out))
}

/// `r, g, b[, a]` or `r g b[ / a]`.
fn parse_rgb_args(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args
        .split([',', '/', ' '])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if !(3..=4).contains(&parts.len()) {
        return None;
    }
    let mut out = [0u8; 4];
    for (slot, part) in out.iter_mut().zip(&parts[..3]) {
        *slot = to_channel(part.parse::<f64>().ok()?);
    }
    out[3] = match parts.get(3) {
        Some(alpha) => {
            let a = match alpha.strip_suffix('%') {
                Some(pct) => pct.parse::<f64>().ok()? / 100.0,
                None => alpha.parse::<f64>().ok()?,
            };
            to_channel(a.clamp(0.0, 1.0) * 255.0)
        }
        None => 255,
    };
    Some(Rgba(out))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Source-over compositing of `src` onto `dst`.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = f64::from(src[3]) / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = f64::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (f64::from(src[i]) * sa + f64::from(dst[i]) * da * (1.0 - sa)) / out_a;
        dst[i] = to_channel(c);
    }
    dst[3] = to_channel(out_a * 255.0);
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// A node box in output pixels, rotated about its center.
#[derive(Debug, Clone, Copy)]
struct PxBox {
    cx: f64,
    cy: f64,
    half_w: f64,
    half_h: f64,
    cos: f64,
    sin: f64,
}

impl PxBox {
    fn new(x: f64, y: f64, w: f64, h: f64, rotation_deg: f64) -> Self {
        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        Self { cx: x + w / 2.0, cy: y + h / 2.0, half_w: w / 2.0, half_h: h / 2.0, cos, sin }
    }

    /// Point in the box's unrotated frame, relative to its center.
    fn local(&self, px: f64, py: f64) -> (f64, f64) {
        let dx = px - self.cx;
        let dy = py - self.cy;
        (dx * self.cos + dy * self.sin, -dx * self.sin + dy * self.cos)
    }

    fn contains(&self, px: f64, py: f64, inset_x: f64, inset_y: f64) -> bool {
        let (lx, ly) = self.local(px, py);
        lx.abs() < self.half_w - inset_x && ly.abs() < self.half_h - inset_y
    }

    /// Pixel range covering the box after rotation, clipped to the image.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let r = self.half_w.hypot(self.half_h);
        let clip = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
        (
            clip((self.cx - r).floor(), width),
            clip((self.cy - r).floor(), height),
            clip((self.cx + r).ceil(), width),
            clip((self.cy + r).ceil(), height),
        )
    }
}

// =============================================================================
// PAINTING
// =============================================================================

/// Part of a box a paint operation covers.
#[derive(Debug, Clone, Copy)]
enum Region {
    Whole,
    /// One-unit frame along the edges.
    Frame,
    /// Horizontal band through the center, `inset_y` pixels in from the top
    /// and bottom.
    Band { inset_y: f64 },
}

struct Painter<'a> {
    image: &'a mut RasterImage,
    scale: f64,
}

impl Painter<'_> {
    fn paint(&mut self, node: &RenderNode, origin_x: f64, origin_y: f64) -> Result<(), RasterError> {
        let x = origin_x + node.rect.x;
        let y = origin_y + node.rect.y;
        let s = self.scale;
        let px_box = PxBox::new(x * s, y * s, node.rect.width * s, node.rect.height * s, node.rotation);

        if let Some(bg) = &node.style.background {
            self.fill(&px_box, parse_color(bg)?, Region::Whole);
        }
        if let Some(border) = &node.style.border_color {
            self.fill(&px_box, parse_color(border)?, Region::Frame);
        }
        match (&node.image, &node.text, &node.style.color) {
            (Some(src), _, _) => debug!(image = %src, "image reference not loaded"),
            (None, Some(_), Some(fg)) => {
                let inset_y = px_box.half_h * (1.0 - TEXT_BAR_RATIO);
                self.fill(&px_box, parse_color(fg)?, Region::Band { inset_y });
            }
            _ => {}
        }

        for child in node.paint_order() {
            self.paint(child, x, y)?;
        }
        Ok(())
    }

    fn fill(&mut self, px_box: &PxBox, color: Rgba<u8>, region: Region) {
        let (x0, y0, x1, y1) = px_box.pixel_bounds(self.image.width(), self.image.height());
        let border = self.scale;
        for py in y0..y1 {
            for px in x0..x1 {
                let (cx, cy) = (f64::from(px) + 0.5, f64::from(py) + 0.5);
                if !px_box.contains(cx, cy, 0.0, 0.0) {
                    continue;
                }
                let covered = match region {
                    Region::Whole => true,
                    Region::Frame => !px_box.contains(cx, cy, border, border),
                    Region::Band { inset_y } => px_box.contains(cx, cy, 0.0, inset_y),
                };
                if covered {
                    blend(self.image.get_pixel_mut(px, py), color);
                }
            }
        }
    }
}

/// Render target that paints with [`Painter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareRasterizer;

impl SoftwareRasterizer {
    /// Clone `root`, apply the capture hook to the clone and paint it.
    ///
    /// # Errors
    ///
    /// - [`RasterError::EmptySurface`] if the scaled surface has no pixels.
    /// - [`RasterError::UnsupportedColor`] if a node carries a color the
    ///   parser rejects.
    pub fn render(root: &RenderNode, options: &CaptureOptions) -> Result<RasterImage, RasterError> {
        let mut tree = root.clone();
        (options.on_clone)(&mut tree);

        let scale = if options.scale > 0.0 { options.scale } else { 1.0 };
        let width = to_pixels(tree.rect.width * scale);
        let height = to_pixels(tree.rect.height * scale);
        if width == 0 || height == 0 {
            return Err(RasterError::EmptySurface { width, height });
        }

        let base = if options.transparent_background { TRANSPARENT } else { WHITE };
        let mut image = RasterImage::from_pixel(width, height, base);
        // The surface is the origin; its own offset is not painted.
        let mut surface = tree;
        surface.rect.x = 0.0;
        surface.rect.y = 0.0;
        Painter { image: &mut image, scale }.paint(&surface, 0.0, 0.0)?;
        debug!(width, height, scale, "surface rasterized");
        Ok(image)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 { v.round().min(f64::from(u32::MAX)) as u32 } else { 0 }
}

#[async_trait(?Send)]
impl RenderTarget for SoftwareRasterizer {
    async fn snapshot(&self, root: &RenderNode, options: &CaptureOptions) -> Result<RasterImage, RasterError> {
        Self::render(root, options)
    }
}
