//! Host font discovery for target-language scripts.
//!
//! The embedded DejaVu Sans covers Latin, Cyrillic, Greek and Arabic, but
//! not Devanagari or CJK. For those scripts the resolver walks the host's
//! font directories looking for a known family, and falls back to the
//! embedded font when nothing suitable is installed.
//!
//! Resolved font bytes are leaked: fonts live for the whole run anyway and
//! both consumers (glyph rasterization and PDF embedding) want `'static`
//! data.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ab_glyph::FontRef;
use tracing::{debug, warn};

use crate::config::Lang;
use crate::pdf::font::DEJAVU_SANS;
use crate::pdf::replace::ReplacementFont;
use crate::pdf::EmbeddedFont;

/// Maximum directory depth when walking font directories.
const MAX_WALK_DEPTH: usize = 4;

/// Minimum fraction of the translated text a host font must have glyphs
/// for before it is preferred over the embedded fallback.
const MIN_COVERAGE: f32 = 0.9;

/// A discovered host font file.
#[derive(Clone, Copy)]
struct HostFont {
    bytes: &'static [u8],
    name: &'static str,
}

/// Finds and caches fonts suitable for a target language.
pub struct FontResolver {
    /// Memoized lookups keyed by (language code, bold)
    cache: Mutex<HashMap<(String, bool), Option<HostFont>>>,
}

impl FontResolver {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Font for drawing text onto rasterized pages.
    ///
    /// Always succeeds: the embedded DejaVu Sans backs any language no
    /// host font was found for.
    #[allow(clippy::expect_used)] // Compile-time bytes, cannot fail to parse
    pub fn raster_font(&self, lang: &Lang, bold: bool) -> FontRef<'static> {
        if let Some(host) = self.resolve(lang, bold) {
            match FontRef::try_from_slice(host.bytes) {
                Ok(font) => return font,
                Err(e) => {
                    warn!("Host font {} unusable for rasterization: {e}", host.name);
                }
            }
        }
        FontRef::try_from_slice(DEJAVU_SANS).expect("Failed to parse embedded DejaVu Sans font")
    }

    /// Font for native PDF text replacement, degrading from a host font to
    /// the embedded fallback to a built-in Type1 font.
    ///
    /// `sample` is representative translated text; a host font that lacks
    /// glyphs for too much of it is passed over, since a family name
    /// matching the target language does not guarantee script coverage.
    pub fn replacement_font(&self, lang: &Lang, sample: &str) -> ReplacementFont {
        if let Some(host) = self.resolve(lang, false) {
            match EmbeddedFont::from_static(host.bytes, host.name) {
                Ok(embedded) => {
                    let coverage = embedded.coverage(sample);
                    if coverage >= MIN_COVERAGE {
                        return ReplacementFont::Embedded(Box::leak(Box::new(embedded)));
                    }
                    warn!(
                        "Host font {} covers only {:.0}% of the translated text, using fallback",
                        host.name,
                        coverage * 100.0
                    );
                }
                Err(e) => {
                    warn!("Host font {} unusable for embedding: {e}", host.name);
                }
            }
        }
        EmbeddedFont::fallback().map_or(
            ReplacementFont::Builtin("Helvetica"),
            ReplacementFont::Embedded,
        )
    }

    fn resolve(&self, lang: &Lang, bold: bool) -> Option<HostFont> {
        let key = (lang.as_str().to_string(), bold);

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return *hit;
            }
        }

        let found = find_host_font(lang.as_str(), bold);
        if let Some(host) = found {
            debug!("Resolved font for {lang} (bold={bold}): {}", host.name);
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, found);
        }
        found
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Known font families per language, in preference order. Matched as
/// case-insensitive substrings of the file name.
fn family_candidates(lang: &str) -> &'static [&'static str] {
    match lang {
        "hi" | "mr" | "ne" => &["notosansdevanagari", "lohit-devanagari", "gargi", "nakula"],
        "zh" | "zh-CN" => &["notosanscjk", "notosanssc", "sourcehansans", "wqy"],
        "zh-TW" => &["notosanscjk", "notosanstc", "sourcehansans", "wqy"],
        "ja" => &["notosanscjk", "notosansjp", "takaopgothic", "ipagp"],
        "ko" => &["notosanscjk", "notosanskr", "nanumgothic"],
        "ar" | "fa" | "ur" => &["notosansarabic", "notonaskharabic", "amiri", "kacst"],
        "th" => &["notosansthai", "loma", "garuda"],
        _ => &["notosans", "dejavusans", "liberationsans"],
    }
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            dirs.push(home.join(".local/share/fonts"));
            dirs.push(home.join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from("C:\\Windows\\Fonts"));
    }

    dirs
}

fn find_host_font(lang: &str, bold: bool) -> Option<HostFont> {
    let candidates = family_candidates(lang);

    for candidate in candidates {
        for dir in font_directories() {
            if let Some(path) = find_in_dir(&dir, candidate, bold, MAX_WALK_DEPTH) {
                if let Some(host) = load_font(&path) {
                    return Some(host);
                }
            }
        }
    }

    None
}

/// Recursively search a directory for a TrueType file matching the family,
/// preferring a bold variant when requested.
fn find_in_dir(dir: &Path, family: &str, bold: bool, depth: usize) -> Option<PathBuf> {
    if depth == 0 {
        return None;
    }

    let entries = fs::read_dir(dir).ok()?;
    let mut regular_match: Option<PathBuf> = None;

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            if let Some(found) = find_in_dir(&path, family, bold, depth - 1) {
                if bold == file_name_lower(&found).contains("bold") {
                    return Some(found);
                }
                regular_match.get_or_insert(found);
            }
            continue;
        }

        let name = file_name_lower(&path);
        if !name.ends_with(".ttf") || !name.contains(family) {
            continue;
        }

        let is_bold = name.contains("bold");
        // Avoid italic and other styled variants for body text
        if name.contains("italic") || name.contains("oblique") {
            continue;
        }

        if is_bold == bold {
            return Some(path);
        }
        regular_match.get_or_insert(path);
    }

    regular_match
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Read a font file and leak its bytes and name to `'static`.
fn load_font(path: &Path) -> Option<HostFont> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read font file {}: {e}", path.display());
            return None;
        }
    };

    let name: String = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "HostFont".to_string())
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    Some(HostFont {
        bytes: Box::leak(bytes.into_boxed_slice()),
        name: Box::leak(name.into_boxed_str()),
    })
}
