//! Stroke rasterizer: the authoritative pixel buffer for freehand ink.
//!
//! DESIGN
//! ======
//! Ink is never stored as vectors. Every `draw` event is a single
//! [`StrokeSegment`] that is composited once into a [`RasterBuffer`] and then
//! discarded. Peers converge because rasterization is a pure function of the
//! segment list: coverage is a hard distance-to-segment test on pixel centers
//! (no anti-aliasing, no sub-pixel accumulation), so replaying the same
//! segments in the same order yields byte-identical buffers.
//!
//! Segment coordinates arrive in the sender's device pixels at world scale.
//! Dividing by `device_scale` yields world units, which map 1:1 onto buffer
//! pixels.
//!
//! ERROR HANDLING
//! ==============
//! Drawing never fails: non-finite segments are skipped and coverage is
//! clipped to the buffer. Only PNG encode/decode return [`RasterError`].

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::camera::Point;
use crate::color::{Rgba, TRANSPARENT, parse_color};

/// Prefix of every PNG data-URI this module produces or accepts.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Wire value of the color field that selects erase mode.
pub const ERASER: &str = "eraser";

/// Smallest coverage radius; keeps hairline strokes gap-free on diagonals.
const MIN_RADIUS: f64 = std::f64::consts::FRAC_1_SQRT_2;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("not a png data uri")]
    NotPngDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("png decode failed: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("png encode failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("unsupported png color type: {0:?}")]
    UnsupportedFormat(png::ColorType),
}

/// How a segment affects the pixels it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paint {
    /// Paint with a CSS color.
    Color(String),
    /// Clear covered pixels to transparent.
    Eraser,
}

impl Paint {
    /// Interpret a wire color value (`"eraser"` or a CSS color).
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        if value == ERASER { Self::Eraser } else { Self::Color(value.to_owned()) }
    }

    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Color(c) => c,
            Self::Eraser => ERASER,
        }
    }
}

/// One line segment of a freehand or eraser stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeSegment {
    /// Start, in sender device pixels at world scale.
    pub from: Point,
    /// End, in sender device pixels at world scale.
    pub to: Point,
    pub paint: Paint,
    /// Line width in sender device pixels.
    pub width: f64,
    /// Sender's device pixel ratio.
    pub device_scale: f64,
}

impl StrokeSegment {
    /// Endpoints and width in world units.
    #[must_use]
    pub fn normalized(&self) -> (Point, Point, f64) {
        let scale = if self.device_scale.is_finite() && self.device_scale > 0.0 {
            self.device_scale
        } else {
            1.0
        };
        (
            Point::new(self.from.x / scale, self.from.y / scale),
            Point::new(self.to.x / scale, self.to.y / scale),
            self.width / scale,
        )
    }
}

/// A fixed-size RGBA8 pixel buffer in world units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Transparent buffer. Dimensions are clamped to at least 1×1.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: Rgba) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self { width, height, pixels }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Whether every pixel is fully transparent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn put(&mut self, x: u32, y: u32, rgba: Rgba) {
        let i = self.index(x, y);
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Rasterize one segment with round caps.
    pub fn apply_stroke(&mut self, segment: &StrokeSegment) {
        let (from, to, width) = segment.normalized();
        let rgba = match &segment.paint {
            Paint::Color(c) => parse_color(c),
            Paint::Eraser => TRANSPARENT,
        };
        self.stroke_line(from, to, width, rgba);
    }

    /// Overwrite every pixel whose center lies within `width / 2` of the
    /// segment `from`→`to` (world units).
    pub fn stroke_line(&mut self, from: Point, to: Point, width: f64, rgba: Rgba) {
        if ![from.x, from.y, to.x, to.y, width].iter().all(|v| v.is_finite()) {
            return;
        }
        let radius = (width / 2.0).max(MIN_RADIUS);
        let Some((x0, y0, x1, y1)) = self.clip_bounds(
            from.x.min(to.x) - radius,
            from.y.min(to.y) - radius,
            from.x.max(to.x) + radius,
            from.y.max(to.y) + radius,
        ) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let center = pixel_center(x, y);
                if distance_to_segment(center, from, to) <= radius {
                    self.put(x, y, rgba);
                }
            }
        }
    }

    /// Fill a closed polygon (even-odd rule) sampled at pixel centers.
    pub fn fill_polygon(&mut self, points: &[Point], rgba: Rgba) {
        if points.len() < 3 || !points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return;
        }
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let Some((x0, y0, x1, y1)) = self.clip_bounds(min_x, min_y, max_x, max_y) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                if point_in_polygon(pixel_center(x, y), points) {
                    self.put(x, y, rgba);
                }
            }
        }
    }

    /// Composite `top` over this buffer (source-over, straight alpha).
    /// Only the overlapping region is touched.
    pub fn composite_over(&mut self, top: &RasterBuffer) {
        let w = self.width.min(top.width);
        let h = self.height.min(top.height);
        for y in 0..h {
            for x in 0..w {
                let t = top.index(x, y);
                let src = [top.pixels[t], top.pixels[t + 1], top.pixels[t + 2], top.pixels[t + 3]];
                match src[3] {
                    0 => {}
                    255 => self.put(x, y, src),
                    _ => {
                        let i = self.index(x, y);
                        let dst = [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]];
                        self.put(x, y, blend_over(src, dst));
                    }
                }
            }
        }
    }

    /// Pixel range `[x0, x1) × [y0, y1)` covering a world-space box, clipped
    /// to the buffer. `None` when nothing is visible.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn clip_bounds(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<(u32, u32, u32, u32)> {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        let x0 = min_x.floor().clamp(0.0, w) as u32;
        let y0 = min_y.floor().clamp(0.0, h) as u32;
        let x1 = (max_x.ceil() + 1.0).clamp(0.0, w) as u32;
        let y1 = (max_y.ceil() + 1.0).clamp(0.0, h) as u32;
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    // =========================================================================
    // PNG
    // =========================================================================

    /// Encode as an RGBA8 PNG.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Encode`] if the encoder rejects the image.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, RasterError> {
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(png_data)
    }

    /// Decode a PNG of any 8/16-bit color type into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Decode`] for malformed PNG data.
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, RasterError> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        let pixels = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::GrayscaleAlpha => buf.chunks_exact(2).flat_map(|c| [c[0], c[0], c[0], c[1]]).collect(),
            other @ png::ColorType::Indexed => return Err(RasterError::UnsupportedFormat(other)),
        };

        Ok(Self { width: info.width, height: info.height, pixels })
    }

    /// Encode as a `data:image/png;base64,...` URI.
    ///
    /// # Errors
    ///
    /// Propagates [`RasterBuffer::to_png_bytes`] failures.
    pub fn to_data_uri(&self) -> Result<String, RasterError> {
        let bytes = self.to_png_bytes()?;
        Ok(format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(bytes)))
    }

    /// Decode a PNG data URI.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::NotPngDataUri`] when the prefix is missing, and
    /// base64/PNG errors otherwise.
    pub fn from_data_uri(uri: &str) -> Result<Self, RasterError> {
        let Some(encoded) = uri.strip_prefix(PNG_DATA_URI_PREFIX) else {
            return Err(RasterError::NotPngDataUri);
        };
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_png_bytes(&bytes)
    }
}

fn pixel_center(x: u32, y: u32) -> Point {
    Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)
}

/// Euclidean distance from `p` to the closed segment `a`–`b`.
#[must_use]
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[allow(clippy::cast_possible_truncation)]
fn blend_over(src: Rgba, dst: Rgba) -> Rgba {
    let sa = u32::from(src[3]);
    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    // Alpha scaled by 255.
    let out_a = sa * 255 + da * inv;
    if out_a == 0 {
        return TRANSPARENT;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (u32::from(src[c]) * sa * 255 + u32::from(dst[c]) * da * inv) / out_a;
        out[c] = v.min(255) as u8;
    }
    out[3] = ((out_a + 127) / 255).min(255) as u8;
    out
}
