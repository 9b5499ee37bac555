//! Composite renderer: flattens ink, shapes and text boxes into one image.
//!
//! The composite is what gets persisted as a document's `imageData`
//! thumbnail. Draw order is white background, ink, shapes (ID order), then
//! text boxes (ID order), mirroring the on-screen stacking where text boxes
//! float above everything else.
//!
//! Shapes are stroked outlines in their own color. Text boxes render as a
//! light frame with one bar per text line; glyphs are not rasterized.

#[cfg(test)]
#[path = "composite_test.rs"]
mod composite_test;

use std::f64::consts::TAU;

use crate::camera::Point;
use crate::color::{Rgba, WHITE, parse_color};
use crate::consts::{DOT_GAP, DOT_LENGTH, ELLIPSE_SEGMENTS, SHAPE_STROKE_WIDTH};
use crate::doc::{Bounds, ObjectStore, ShapeKind, ShapeObject, TextBoxObject};
use crate::raster::RasterBuffer;

const TEXT_FRAME: Rgba = [200, 200, 200, 255];
const TEXT_INK: Rgba = [64, 64, 64, 255];
const TEXT_PADDING: f64 = 4.0;
const TEXT_LINE_HEIGHT: f64 = 16.0;
const TEXT_ADVANCE: f64 = 7.0;

/// Build the flattened image for persistence.
#[must_use]
pub fn render_composite(store: &ObjectStore, ink: &RasterBuffer) -> RasterBuffer {
    let mut out = RasterBuffer::filled(ink.width(), ink.height(), WHITE);
    out.composite_over(ink);
    for shape in store.shapes() {
        draw_shape(&mut out, shape);
    }
    for text_box in store.text_boxes() {
        draw_text_box(&mut out, text_box);
    }
    out
}

/// Stroke one shape outline into `buf`.
pub fn draw_shape(buf: &mut RasterBuffer, shape: &ShapeObject) {
    let rgba = parse_color(&shape.color);
    let b = shape.bounds();
    let c = b.center();
    let w = SHAPE_STROKE_WIDTH;

    match shape.kind {
        ShapeKind::Circle => {
            let r = b.width.min(b.height) / 2.0;
            stroke_polyline(buf, &ellipse(c, r, r, b.rotation), w, rgba);
        }
        ShapeKind::Oval => {
            stroke_polyline(buf, &ellipse(c, b.width / 2.0, b.height / 2.0, b.rotation), w, rgba);
        }
        ShapeKind::Square => {
            let side = b.width.min(b.height);
            let sq = Bounds { x: c.x - side / 2.0, y: c.y - side / 2.0, width: side, height: side, rotation: b.rotation };
            stroke_closed(buf, &sq.corners(), w, rgba);
        }
        ShapeKind::Rectangle => stroke_closed(buf, &b.corners(), w, rgba),
        ShapeKind::ArrowLine | ShapeKind::ArrowSolid | ShapeKind::ArrowOutline | ShapeKind::ArrowDotted => {
            draw_arrow(buf, shape.kind, &b, rgba);
        }
    }
}

/// Arrow running left-middle to right-middle of the box, head at the right.
fn draw_arrow(buf: &mut RasterBuffer, kind: ShapeKind, b: &Bounds, rgba: Rgba) {
    let c = b.center();
    let rot = |p: Point| p.rotate_about(c, b.rotation);
    let w = SHAPE_STROKE_WIDTH;

    let head_len = (b.width * 0.25).min(b.height.max(8.0));
    let half = head_len * 0.5;
    let tail = rot(Point::new(b.x, c.y));
    let tip = rot(Point::new(b.x + b.width, c.y));
    let back_mid = rot(Point::new(b.x + b.width - head_len, c.y));
    let back_top = rot(Point::new(b.x + b.width - head_len, c.y - half));
    let back_bot = rot(Point::new(b.x + b.width - head_len, c.y + half));

    match kind {
        ShapeKind::ArrowSolid => {
            buf.stroke_line(tail, back_mid, w, rgba);
            buf.fill_polygon(&[tip, back_top, back_bot], rgba);
        }
        ShapeKind::ArrowOutline => {
            buf.stroke_line(tail, back_mid, w, rgba);
            stroke_closed(buf, &[tip, back_top, back_bot], w, rgba);
        }
        ShapeKind::ArrowDotted => {
            stroke_dotted(buf, tail, tip, w, rgba);
            buf.stroke_line(tip, back_top, w, rgba);
            buf.stroke_line(tip, back_bot, w, rgba);
        }
        _ => {
            buf.stroke_line(tail, tip, w, rgba);
            buf.stroke_line(tip, back_top, w, rgba);
            buf.stroke_line(tip, back_bot, w, rgba);
        }
    }
}

/// Frame plus one bar per non-blank text line, clipped to the box height.
pub fn draw_text_box(buf: &mut RasterBuffer, text_box: &TextBoxObject) {
    let b = text_box.bounds();
    let c = b.center();
    stroke_closed(buf, &b.corners(), 1.0, TEXT_FRAME);

    let max_len = (b.width - 2.0 * TEXT_PADDING).max(0.0);
    let mut baseline = b.y + TEXT_PADDING + TEXT_LINE_HEIGHT / 2.0;
    for line in text_box.text.lines() {
        if baseline > b.y + b.height {
            break;
        }
        let chars = line.trim_end().chars().count();
        if chars > 0 {
            #[allow(clippy::cast_precision_loss)]
            let len = (chars as f64 * TEXT_ADVANCE).min(max_len);
            let from = Point::new(b.x + TEXT_PADDING, baseline).rotate_about(c, b.rotation);
            let to = Point::new(b.x + TEXT_PADDING + len, baseline).rotate_about(c, b.rotation);
            buf.stroke_line(from, to, 2.0, TEXT_INK);
        }
        baseline += TEXT_LINE_HEIGHT;
    }
}

#[allow(clippy::cast_precision_loss)]
fn ellipse(center: Point, rx: f64, ry: f64, rotation: f64) -> Vec<Point> {
    (0..=ELLIPSE_SEGMENTS)
        .map(|i| {
            let t = TAU * i as f64 / ELLIPSE_SEGMENTS as f64;
            Point::new(center.x + rx * t.cos(), center.y + ry * t.sin()).rotate_about(center, rotation)
        })
        .collect()
}

fn stroke_polyline(buf: &mut RasterBuffer, points: &[Point], width: f64, rgba: Rgba) {
    for pair in points.windows(2) {
        buf.stroke_line(pair[0], pair[1], width, rgba);
    }
}

fn stroke_closed(buf: &mut RasterBuffer, points: &[Point], width: f64, rgba: Rgba) {
    stroke_polyline(buf, points, width, rgba);
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        buf.stroke_line(*last, *first, width, rgba);
    }
}

fn stroke_dotted(buf: &mut RasterBuffer, from: Point, to: Point, width: f64, rgba: Rgba) {
    let len = from.distance(to);
    if len == 0.0 || !len.is_finite() {
        return;
    }
    let (ux, uy) = ((to.x - from.x) / len, (to.y - from.y) / len);
    let mut d = 0.0;
    while d < len {
        let end = (d + DOT_LENGTH).min(len);
        buf.stroke_line(
            Point::new(from.x + ux * d, from.y + uy * d),
            Point::new(from.x + ux * end, from.y + uy * end),
            width,
            rgba,
        );
        d += DOT_LENGTH + DOT_GAP;
    }
}
