//! Application settings (library path, pipeline defaults).
//!
//! Settings live in `~/.config/romshelf/settings.toml`. Updates are
//! surgical (`toml::Value`, not a typed struct) so fields this version
//! doesn't know about survive a round-trip.

use std::io;
use std::path::{Path, PathBuf};

use crate::compress::CompressOptions;
use crate::translate::TranslateOptions;

/// Canonical path to the settings file: `~/.config/romshelf/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("romshelf").join("settings.toml")
}

/// Resolve the library root path using a priority chain:
///
/// 1. CLI override (if `Some`)
/// 2. Saved `library.current_root` in `settings.toml`
/// 3. Current working directory
pub fn resolve_library_path(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(p) = cli_override {
        return p;
    }
    if let Some(p) = load_library_path() {
        return p;
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Read `library.current_root` from `settings.toml`, if set.
fn load_library_path() -> Option<PathBuf> {
    let doc = load_doc()?;
    let root = doc.get("library")?.get("current_root")?.as_str()?;
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}

/// Translation defaults, with `[translate]` overrides applied on top.
pub fn load_translate_options() -> TranslateOptions {
    let mut options = TranslateOptions::default();
    if let Some(doc) = load_doc() {
        if let Some(table) = doc.get("translate") {
            if let Some(v) = table.get("source_lang").and_then(|v| v.as_str()) {
                options.source_lang = v.to_string();
            }
            if let Some(v) = table.get("target_lang").and_then(|v| v.as_str()) {
                options.target_lang = v.to_string();
            }
            if let Some(v) = table.get("save_interval").and_then(|v| v.as_integer()) {
                options.save_interval = v.max(1) as usize;
            }
        }
    }
    options
}

/// Compression defaults, with `[compress]` overrides applied on top.
pub fn load_compress_options() -> CompressOptions {
    let mut options = CompressOptions::default();
    if let Some(doc) = load_doc() {
        if let Some(table) = doc.get("compress") {
            if let Some(v) = table.get("scale").and_then(|v| v.as_float()) {
                options.scale = v;
            }
            if let Some(v) = table.get("crf").and_then(|v| v.as_integer()) {
                options.crf = v.clamp(0, 51) as u32;
            }
            if let Some(v) = table.get("max_duration").and_then(|v| v.as_float()) {
                options.max_duration = v;
            }
            if let Some(v) = table.get("workers").and_then(|v| v.as_integer()) {
                options.workers = v.max(1) as usize;
            }
            if let Some(v) = table.get("video_ext").and_then(|v| v.as_str()) {
                options.video_ext = v.trim_start_matches('.').to_string();
            }
        }
    }
    options
}

fn load_doc() -> Option<toml::Value> {
    let contents = std::fs::read_to_string(settings_path()).ok()?;
    contents.parse().ok()
}

/// Save (or clear) the library path in `settings.toml`.
pub fn save_library_path(path: Option<&Path>) -> io::Result<()> {
    let settings = settings_path();
    let mut doc: toml::Value = if let Ok(contents) = std::fs::read_to_string(&settings) {
        contents
            .parse()
            .unwrap_or_else(|_| toml::Value::Table(Default::default()))
    } else {
        toml::Value::Table(Default::default())
    };

    // Ensure [library] table exists
    let table = doc
        .as_table_mut()
        .ok_or_else(|| io::Error::other("settings.toml root is not a table"))?;
    let library = table
        .entry("library")
        .or_insert_with(|| toml::Value::Table(Default::default()));
    let lib_table = library
        .as_table_mut()
        .ok_or_else(|| io::Error::other("[library] is not a table"))?;

    match path {
        Some(p) => {
            lib_table.insert(
                "current_root".to_string(),
                toml::Value::String(p.to_string_lossy().into_owned()),
            );
        }
        None => {
            lib_table.remove("current_root");
        }
    }

    // Write atomically
    if let Some(parent) = settings.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(&doc).map_err(io::Error::other)?;
    let tmp = settings.with_extension("toml.tmp");
    std::fs::write(&tmp, &serialized)?;
    std::fs::rename(&tmp, &settings)?;

    Ok(())
}

/// Load the full settings file as a pretty-printed TOML string for display.
pub fn load_settings_string() -> Option<String> {
    let doc = load_doc()?;
    toml::to_string_pretty(&doc).ok()
}
