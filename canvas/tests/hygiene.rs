//! Source checks for the canvas engine.
//!
//! The engine replays whatever peers send, so production code may not panic,
//! swallow an error, or print. Object collections stay ID-ordered, and
//! numeric casts stay inside the pixel and palette helpers that own them.

use std::fs;
use std::path::Path;

/// Files allowed to hold numeric `as` casts.
const CAST_FILES: &[&str] = &["raster.rs", "composite.rs", "presence.rs"];

const CAST_TARGETS: &[&str] = &[
    " as u8", " as u16", " as u32", " as u64", " as usize", " as i32", " as i64", " as f32", " as f64",
];

struct SourceFile {
    name: String,
    lines: Vec<String>,
}

impl SourceFile {
    /// Non-comment lines with their 1-based numbers.
    fn code(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.as_str()))
            .filter(|(_, line)| !line.trim_start().starts_with("//"))
    }
}

/// Production sources under `src/`; `*_test.rs` files are skipped.
fn sources() -> Vec<SourceFile> {
    let mut files: Vec<SourceFile> = fs::read_dir(Path::new("src"))
        .expect("canvas src dir")
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == "rs"))
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            if name.ends_with("_test.rs") {
                return None;
            }
            let content = fs::read_to_string(&path).ok()?;
            Some(SourceFile { name, lines: content.lines().map(str::to_owned).collect() })
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    assert!(files.iter().any(|f| f.name == "engine.rs"), "run from the canvas crate root");
    files
}

/// Every `file:line` in `files` whose code contains one of `patterns`.
fn hits(files: &[SourceFile], patterns: &[&str]) -> Vec<String> {
    files
        .iter()
        .flat_map(|file| {
            file.code()
                .filter(|(_, line)| patterns.iter().any(|p| line.contains(p)))
                .map(|(n, line)| format!("{}:{n}: {}", file.name, line.trim()))
        })
        .collect()
}

fn assert_none(what: &str, found: &[String]) {
    assert!(found.is_empty(), "{what} in canvas sources:\n{}", found.join("\n"));
}

#[test]
fn no_panicking_calls() {
    let files = sources();
    let found = hits(
        &files,
        &[".unwrap()", ".expect(", "panic!(", "unreachable!(", "todo!(", "unimplemented!("],
    );
    assert_none("panicking calls", &found);
}

#[test]
fn no_silently_discarded_errors() {
    let files = sources();
    assert_none("discarded results", &hits(&files, &["let _ =", ".ok()"]));
}

#[test]
fn no_stdout_or_debug_printing() {
    let files = sources();
    assert_none("printing", &hits(&files, &["println!(", "eprintln!(", "dbg!("]));
}

#[test]
fn no_dead_code_allowances() {
    let files = sources();
    assert_none("dead_code allowances", &hits(&files, &["allow(dead_code)"]));
}

#[test]
fn object_store_uses_id_ordered_maps() {
    let files = sources();
    let doc: Vec<SourceFile> = files.into_iter().filter(|f| f.name == "doc.rs").collect();
    assert_eq!(doc.len(), 1, "doc.rs not found");
    assert_none("hash-ordered collections in doc.rs", &hits(&doc, &["HashMap", "HashSet"]));
}

#[test]
fn numeric_casts_stay_in_pixel_helpers() {
    let files: Vec<SourceFile> = sources()
        .into_iter()
        .filter(|f| !CAST_FILES.contains(&f.name.as_str()))
        .collect();
    assert_none("numeric casts outside pixel helpers", &hits(&files, CAST_TARGETS));
}
