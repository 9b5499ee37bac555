//! CSS color parsing for stroke and shape colors.
//!
//! Only the forms the toolbar and peers actually send are understood: a small
//! set of named colors plus `#rgb` / `#rrggbb` hex. Anything else resolves to
//! opaque black so a bad color never aborts a replay.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Straight (non-premultiplied) RGBA, 8 bits per channel.
pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];
pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

const NAMED: &[(&str, Rgba)] = &[
    ("black", BLACK),
    ("white", WHITE),
    ("grey", [128, 128, 128, 255]),
    ("gray", [128, 128, 128, 255]),
    ("blue", [0, 0, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("orange", [255, 165, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("pink", [255, 192, 203, 255]),
    ("brown", [165, 42, 42, 255]),
];

/// Resolve a CSS color string, falling back to black.
#[must_use]
pub fn parse_color(input: &str) -> Rgba {
    let trimmed = input.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).unwrap_or(BLACK);
    }
    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map_or(BLACK, |(_, rgba)| *rgba)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let Ok(value) = u32::from_str_radix(hex, 16) else {
        return None;
    };
    let [_, r, g, b] = match hex.len() {
        // #rgb: each nibble is doubled (0xf -> 0xff).
        3 => {
            let expand = |n: u32| (n & 0xf) * 0x11;
            (expand(value >> 8) << 16 | expand(value >> 4) << 8 | expand(value)).to_be_bytes()
        }
        6 => value.to_be_bytes(),
        _ => return None,
    };
    Some([r, g, b, 255])
}

/// Format an opaque color as `#rrggbb`.
#[must_use]
pub fn to_hex(rgba: Rgba) -> String {
    format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])
}
