#![allow(clippy::float_cmp)]

use super::*;
use crate::color::{BLACK, WHITE};

fn segment(from: (f64, f64), to: (f64, f64), paint: &str, width: f64, scale: f64) -> StrokeSegment {
    StrokeSegment {
        from: Point::new(from.0, from.1),
        to: Point::new(to.0, to.1),
        paint: Paint::from_wire(paint),
        width,
        device_scale: scale,
    }
}

fn sample_segments() -> Vec<StrokeSegment> {
    vec![
        segment((2.0, 2.0), (30.0, 5.0), "red", 3.0, 1.0),
        segment((30.0, 5.0), (12.0, 28.0), "#00f", 5.0, 1.0),
        segment((40.0, 40.0), (80.0, 10.0), "green", 8.0, 2.0),
        segment((10.0, 10.0), (25.0, 12.0), ERASER, 4.0, 1.0),
        segment((5.0, 35.0), (5.0, 35.0), "black", 6.0, 1.0),
    ]
}

// =============================================================
// Determinism
// =============================================================

#[test]
fn identical_segment_lists_produce_identical_buffers() {
    let mut a = RasterBuffer::new(48, 48);
    let mut b = RasterBuffer::new(48, 48);
    for seg in sample_segments() {
        a.apply_stroke(&seg);
    }
    for seg in sample_segments() {
        b.apply_stroke(&seg);
    }
    assert_eq!(a.pixels(), b.pixels());
    assert!(!a.is_blank());
}

#[test]
fn segment_order_matters_for_overlaps() {
    let red = segment((0.0, 10.0), (20.0, 10.0), "red", 4.0, 1.0);
    let blue = segment((10.0, 0.0), (10.0, 20.0), "blue", 4.0, 1.0);

    let mut a = RasterBuffer::new(20, 20);
    a.apply_stroke(&red);
    a.apply_stroke(&blue);

    let mut b = RasterBuffer::new(20, 20);
    b.apply_stroke(&blue);
    b.apply_stroke(&red);

    assert_eq!(a.pixel(10, 10), Some([0, 0, 255, 255]));
    assert_eq!(b.pixel(10, 10), Some([255, 0, 0, 255]));
}

// =============================================================
// Coverage
// =============================================================

#[test]
fn stroke_covers_pixels_along_segment() {
    let mut buf = RasterBuffer::new(20, 20);
    buf.apply_stroke(&segment((2.0, 10.0), (18.0, 10.0), "black", 2.0, 1.0));
    for x in 2..18 {
        assert_eq!(buf.pixel(x, 9), Some(BLACK), "pixel ({x}, 9)");
    }
    assert_eq!(buf.pixel(10, 2), Some(TRANSPARENT));
}

#[test]
fn stroke_has_round_caps() {
    let mut buf = RasterBuffer::new(30, 30);
    buf.apply_stroke(&segment((10.0, 15.0), (20.0, 15.0), "black", 10.0, 1.0));
    // Cap extends past the endpoint by the radius along the axis.
    assert_eq!(buf.pixel(23, 14), Some(BLACK));
    // Corner of the would-be square cap stays empty.
    assert_eq!(buf.pixel(24, 10), Some(TRANSPARENT));
}

#[test]
fn zero_length_segment_draws_a_dot() {
    let mut buf = RasterBuffer::new(10, 10);
    buf.apply_stroke(&segment((5.0, 5.0), (5.0, 5.0), "red", 4.0, 1.0));
    assert_eq!(buf.pixel(4, 4), Some([255, 0, 0, 255]));
}

#[test]
fn device_scale_normalizes_to_world_units() {
    let mut hi_dpi = RasterBuffer::new(40, 40);
    hi_dpi.apply_stroke(&segment((20.0, 20.0), (60.0, 20.0), "black", 4.0, 2.0));

    let mut lo_dpi = RasterBuffer::new(40, 40);
    lo_dpi.apply_stroke(&segment((10.0, 10.0), (30.0, 10.0), "black", 2.0, 1.0));

    assert_eq!(hi_dpi.pixels(), lo_dpi.pixels());
}

#[test]
fn invalid_device_scale_is_treated_as_one() {
    let seg = segment((1.0, 2.0), (3.0, 4.0), "black", 6.0, 0.0);
    let (from, to, width) = seg.normalized();
    assert_eq!(from, Point::new(1.0, 2.0));
    assert_eq!(to, Point::new(3.0, 4.0));
    assert_eq!(width, 6.0);
}

#[test]
fn eraser_clears_to_transparent_not_white() {
    let mut buf = RasterBuffer::filled(10, 10, WHITE);
    buf.apply_stroke(&segment((0.0, 5.0), (10.0, 5.0), ERASER, 2.0, 1.0));
    assert_eq!(buf.pixel(5, 4), Some(TRANSPARENT));
    assert_eq!(buf.pixel(5, 0), Some(WHITE));
}

#[test]
fn strokes_outside_buffer_are_clipped() {
    let mut buf = RasterBuffer::new(10, 10);
    buf.apply_stroke(&segment((-50.0, -50.0), (-20.0, -20.0), "black", 4.0, 1.0));
    buf.apply_stroke(&segment((100.0, 100.0), (200.0, 200.0), "black", 4.0, 1.0));
    assert!(buf.is_blank());
}

#[test]
fn non_finite_segments_are_skipped() {
    let mut buf = RasterBuffer::new(10, 10);
    buf.apply_stroke(&segment((f64::NAN, 0.0), (5.0, 5.0), "black", 4.0, 1.0));
    buf.apply_stroke(&segment((0.0, 0.0), (5.0, 5.0), "black", f64::INFINITY, 1.0));
    assert!(buf.is_blank());
}

#[test]
fn unknown_color_paints_black() {
    let mut buf = RasterBuffer::new(10, 10);
    buf.apply_stroke(&segment((5.0, 5.0), (5.0, 5.0), "not-a-color", 4.0, 1.0));
    assert_eq!(buf.pixel(5, 5), Some(BLACK));
}

#[test]
fn fill_polygon_fills_interior_only() {
    let mut buf = RasterBuffer::new(20, 20);
    let tri = [Point::new(0.0, 0.0), Point::new(20.0, 0.0), Point::new(0.0, 20.0)];
    buf.fill_polygon(&tri, BLACK);
    assert_eq!(buf.pixel(2, 2), Some(BLACK));
    assert_eq!(buf.pixel(18, 18), Some(TRANSPARENT));
}

// =============================================================
// Compositing
// =============================================================

#[test]
fn composite_over_keeps_background_where_top_is_transparent() {
    let mut bottom = RasterBuffer::filled(4, 4, WHITE);
    let mut top = RasterBuffer::new(4, 4);
    top.stroke_line(Point::new(0.5, 0.5), Point::new(0.5, 0.5), 1.0, BLACK);
    bottom.composite_over(&top);
    assert_eq!(bottom.pixel(0, 0), Some(BLACK));
    assert_eq!(bottom.pixel(3, 3), Some(WHITE));
}

#[test]
fn composite_over_blends_partial_alpha() {
    let mut bottom = RasterBuffer::filled(1, 1, WHITE);
    let top = RasterBuffer::filled(1, 1, [0, 0, 0, 128]);
    bottom.composite_over(&top);
    let px = bottom.pixel(0, 0).expect("pixel");
    assert_eq!(px[3], 255);
    assert!(px[0] > 120 && px[0] < 135, "got {px:?}");
}

// =============================================================
// PNG
// =============================================================

#[test]
fn data_uri_round_trip_preserves_pixels() {
    let mut buf = RasterBuffer::new(32, 16);
    for seg in sample_segments() {
        buf.apply_stroke(&seg);
    }
    let uri = buf.to_data_uri().expect("encode");
    assert!(uri.starts_with(PNG_DATA_URI_PREFIX));

    let back = RasterBuffer::from_data_uri(&uri).expect("decode");
    assert_eq!(back, buf);
}

#[test]
fn from_data_uri_rejects_other_media_types() {
    let err = RasterBuffer::from_data_uri("data:image/jpeg;base64,AAAA").expect_err("should fail");
    assert!(matches!(err, RasterError::NotPngDataUri));
}

#[test]
fn from_data_uri_rejects_bad_base64() {
    let err = RasterBuffer::from_data_uri("data:image/png;base64,@@@").expect_err("should fail");
    assert!(matches!(err, RasterError::Base64(_)));
}

#[test]
fn from_png_bytes_rejects_garbage() {
    let err = RasterBuffer::from_png_bytes(b"definitely not a png").expect_err("should fail");
    assert!(matches!(err, RasterError::Decode(_)));
}

#[test]
fn from_png_bytes_expands_rgb() {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, 2, 1);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("header");
        writer.write_image_data(&[255, 0, 0, 0, 0, 255]).expect("data");
        writer.finish().expect("finish");
    }
    let buf = RasterBuffer::from_png_bytes(&png_data).expect("decode");
    assert_eq!(buf.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(buf.pixel(1, 0), Some([0, 0, 255, 255]));
}

#[test]
fn zero_sized_buffers_are_clamped() {
    let buf = RasterBuffer::new(0, 0);
    assert_eq!((buf.width(), buf.height()), (1, 1));
    assert!(buf.to_png_bytes().is_ok());
}

#[test]
fn paint_wire_round_trip() {
    assert_eq!(Paint::from_wire("eraser"), Paint::Eraser);
    assert_eq!(Paint::from_wire("blue").as_wire(), "blue");
    assert_eq!(Paint::Eraser.as_wire(), ERASER);
}
