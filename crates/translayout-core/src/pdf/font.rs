//! TrueType font embedding for rewritten PDF text.
//!
//! Translated text usually needs glyphs the document's original fonts do
//! not carry, so the replacement text is set in a font embedded as a
//! CIDFontType2 with Identity-H encoding. That structure supports any
//! Unicode codepoint the font file covers:
//! - **Type0 font**: top-level dictionary referencing:
//!   - **CIDFont**: glyph metrics, referencing:
//!     - **FontDescriptor**: font metadata
//!     - **FontFile2**: the raw TrueType program
//!   - **ToUnicode CMap**: maps glyph IDs back to Unicode for copy/paste

use std::sync::LazyLock;

use lopdf::{Document, Object, ObjectId, Stream};
use ttf_parser::Face;

use crate::error::{Error, Result};

/// DejaVu Sans, embedded at compile time as the fallback when no host font
/// covers the target language.
pub(crate) const DEJAVU_SANS: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Resource name the replacement font is registered under on each page.
const FONT_RESOURCE_NAME: &str = "FTx";

static FALLBACK_FONT: LazyLock<Option<EmbeddedFont>> =
    LazyLock::new(|| EmbeddedFont::from_static(DEJAVU_SANS, "DejaVuSans").ok());

/// A parsed TrueType font ready for embedding.
pub struct EmbeddedFont {
    bytes: &'static [u8],
    face: Face<'static>,
    base_name: &'static str,
}

impl EmbeddedFont {
    /// Parse a font from bytes with process lifetime.
    pub fn from_static(bytes: &'static [u8], base_name: &'static str) -> Result<Self> {
        let face =
            Face::parse(bytes, 0).map_err(|e| Error::Font(format!("Failed to parse font: {e}")))?;
        Ok(Self {
            bytes,
            face,
            base_name,
        })
    }

    /// The compiled-in DejaVu Sans fallback, `None` only if the embedded
    /// bytes fail to parse.
    pub fn fallback() -> Option<&'static Self> {
        FALLBACK_FONT.as_ref()
    }

    /// Glyph ID for a character, .notdef (0) if the font lacks it.
    pub fn glyph_id(&self, c: char) -> u16 {
        self.face.glyph_index(c).map_or(0, |g| g.0)
    }

    /// Fraction of characters in `text` the font has glyphs for.
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self, text: &str) -> f32 {
        let total = text.chars().filter(|c| !c.is_whitespace()).count();
        if total == 0 {
            return 1.0;
        }
        let covered = text
            .chars()
            .filter(|c| !c.is_whitespace() && self.glyph_id(*c) != 0)
            .count();
        covered as f32 / total as f32
    }

    /// Advance width of a glyph in font units.
    fn glyph_width(&self, glyph_id: u16) -> u16 {
        self.face
            .glyph_hor_advance(ttf_parser::GlyphId(glyph_id))
            .unwrap_or(0)
    }

    fn units_per_em(&self) -> u16 {
        self.face.units_per_em()
    }

    /// Width of a string in PDF points at the given font size.
    #[allow(clippy::cast_precision_loss)]
    pub fn string_width(&self, text: &str, font_size: f32) -> f32 {
        let units_per_em = f32::from(self.units_per_em());
        let total_units: u32 = text
            .chars()
            .map(|c| u32::from(self.glyph_width(self.glyph_id(c))))
            .sum();
        total_units as f32 * font_size / units_per_em
    }

    /// Convert text to a hex string of glyph IDs for content streams,
    /// without the angle brackets.
    pub fn text_to_hex_glyphs(&self, text: &str) -> String {
        use std::fmt::Write;
        text.chars().fold(String::new(), |mut acc, c| {
            let _ = write!(acc, "{:04X}", self.glyph_id(c));
            acc
        })
    }

    /// Create the font object graph in a document. The returned Type0 font
    /// id can be registered on any number of pages; the font program itself
    /// is stored once.
    pub fn create_font_objects(&self, doc: &mut Document) -> ObjectId {
        let font_file_id = self.create_font_file(doc);
        let font_descriptor_id = self.create_font_descriptor(doc, font_file_id);
        let cid_font_id = self.create_cid_font(doc, font_descriptor_id);
        let to_unicode_id = Self::create_to_unicode_cmap(doc);
        self.create_type0_font(doc, cid_font_id, to_unicode_id)
    }

    /// Create the FontFile2 stream containing the raw TrueType data.
    #[allow(clippy::cast_possible_wrap)] // Font size always fits in i64
    fn create_font_file(&self, doc: &mut Document) -> ObjectId {
        let mut dict = lopdf::Dictionary::new();
        dict.set("Length1", Object::Integer(self.bytes.len() as i64));

        let stream = Stream::new(dict, self.bytes.to_vec()).with_compression(true);
        doc.add_object(Object::Stream(stream))
    }

    fn create_font_descriptor(&self, doc: &mut Document, font_file_id: ObjectId) -> ObjectId {
        let bbox = self.face.global_bounding_box();

        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Flags", Object::Integer(32)), // Nonsymbolic
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(i64::from(bbox.x_min)),
                    Object::Integer(i64::from(bbox.y_min)),
                    Object::Integer(i64::from(bbox.x_max)),
                    Object::Integer(i64::from(bbox.y_max)),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(self.face.ascender()))),
            ("Descent", Object::Integer(i64::from(self.face.descender()))),
            (
                "CapHeight",
                Object::Integer(i64::from(
                    self.face
                        .capital_height()
                        .unwrap_or_else(|| self.face.ascender()),
                )),
            ),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }

    fn create_cid_font(&self, doc: &mut Document, font_descriptor_id: ObjectId) -> ObjectId {
        let widths_array = self.build_widths_array();
        let default_width = self.scale_width(self.glyph_width(self.glyph_id(' ')));

        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(lopdf::Dictionary::from_iter([
                    (
                        "Registry",
                        Object::String(b"Adobe".to_vec(), lopdf::StringFormat::Literal),
                    ),
                    (
                        "Ordering",
                        Object::String(b"Identity".to_vec(), lopdf::StringFormat::Literal),
                    ),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(font_descriptor_id)),
            ("DW", Object::Integer(default_width)),
            ("W", Object::Array(widths_array)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }

    /// Scale a font-unit width to PDF's 1000-unit text space.
    fn scale_width(&self, width: u16) -> i64 {
        let units_per_em = i64::from(self.face.units_per_em());
        (i64::from(width) * 1000) / units_per_em
    }

    /// Build the W (widths) array for the CIDFont.
    ///
    /// Format: `gid [w1 w2 ...]` for consecutive GIDs starting at gid.
    /// Covers the script ranges the translator can produce; glyphs outside
    /// them fall back to DW.
    fn build_widths_array(&self) -> Vec<Object> {
        use std::collections::BTreeMap;

        let mut gid_widths: BTreeMap<u16, i64> = BTreeMap::new();

        let ranges: &[(u32, u32)] = &[
            (0x0020, 0x007F), // Basic Latin
            (0x00A0, 0x00FF), // Latin-1 Supplement
            (0x0100, 0x017F), // Latin Extended-A
            (0x0180, 0x024F), // Latin Extended-B
            (0x0400, 0x04FF), // Cyrillic
            (0x0600, 0x06FF), // Arabic
            (0x0900, 0x097F), // Devanagari
            (0x2000, 0x206F), // General Punctuation
            (0x20AC, 0x20AC), // Euro sign
            (0x3040, 0x30FF), // Hiragana and Katakana
            (0xAC00, 0xD7AF), // Hangul Syllables
        ];

        for &(start, end) in ranges {
            for codepoint in start..=end {
                if let Some(c) = char::from_u32(codepoint) {
                    let gid = self.glyph_id(c);
                    if gid != 0 {
                        gid_widths.insert(gid, self.scale_width(self.glyph_width(gid)));
                    }
                }
            }
        }

        let mut result = Vec::new();
        let mut iter = gid_widths.iter().peekable();

        while let Some((&first_gid, &first_width)) = iter.next() {
            let mut widths = vec![Object::Integer(first_width)];
            let mut expected_next = first_gid + 1;

            while let Some(&(&gid, &width)) = iter.peek() {
                if gid == expected_next {
                    widths.push(Object::Integer(width));
                    expected_next += 1;
                    iter.next();
                } else {
                    break;
                }
            }

            result.push(Object::Integer(i64::from(first_gid)));
            result.push(Object::Array(widths));
        }

        result
    }

    /// Identity CMap mapping glyph IDs straight to Unicode, enough for
    /// copy/paste support.
    fn create_to_unicode_cmap(doc: &mut Document) -> ObjectId {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo <<
  /Registry (Adobe)
  /Ordering (UCS)
  /Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0000> <FFFF> <0000>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

        let stream = Stream::new(lopdf::Dictionary::new(), cmap.to_vec());
        doc.add_object(Object::Stream(stream))
    }

    fn create_type0_font(
        &self,
        doc: &mut Document,
        cid_font_id: ObjectId,
        to_unicode_id: ObjectId,
    ) -> ObjectId {
        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            (
                "DescendantFonts",
                Object::Array(vec![Object::Reference(cid_font_id)]),
            ),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }
}

/// Register a built-in Type1 font (no embedding) on a page's resources.
///
/// Last-resort path when no TrueType font could be parsed; the text is then
/// limited to WinAnsi-representable characters.
pub fn add_builtin_font(
    doc: &mut Document,
    page_id: ObjectId,
    base_font: &str,
) -> Result<&'static str> {
    let dict = lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]);
    let font_id = doc.add_object(Object::Dictionary(dict));

    add_font_to_page(doc, page_id, FONT_RESOURCE_NAME, font_id)?;
    Ok(FONT_RESOURCE_NAME)
}

/// Add a font to a page's Resources dictionary.
///
/// Resources may be an inline dictionary, an indirect reference, or
/// inherited from a parent Pages node; all three shapes occur in the wild.
pub(crate) fn add_font_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    font_id: ObjectId,
) -> Result<()> {
    let mut resources = resolve_resources(doc, page_id)?;

    let mut fonts = if let Ok(font_obj) = resources.get(b"Font") {
        match font_obj {
            Object::Dictionary(d) => d.clone(),
            Object::Reference(ref_id) => {
                if let Ok(Object::Dictionary(d)) = doc.get_object(*ref_id) {
                    d.clone()
                } else {
                    lopdf::Dictionary::new()
                }
            }
            _ => lopdf::Dictionary::new(),
        }
    } else {
        lopdf::Dictionary::new()
    };

    fonts.set(name, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    // Write back inline so the addition is visible regardless of how the
    // original Resources were stored
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(page_dict) = page {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(())
}

fn resolve_resources(doc: &Document, page_id: ObjectId) -> Result<lopdf::Dictionary> {
    let page = doc
        .get_object(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(page_dict) = page {
        if let Ok(res_obj) = page_dict.get(b"Resources") {
            if let Some(dict) = resolve_dict_object(doc, res_obj) {
                return Ok(dict);
            }
        }

        if let Ok(parent_obj) = page_dict.get(b"Parent") {
            if let Some(dict) = resolve_inherited_resources(doc, parent_obj, 10) {
                return Ok(dict);
            }
        }
    }

    Ok(lopdf::Dictionary::new())
}

fn resolve_dict_object(doc: &Document, obj: &Object) -> Option<lopdf::Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(ref_id) => {
            if let Ok(Object::Dictionary(d)) = doc.get_object(*ref_id) {
                Some(d.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Walk up the Pages tree looking for inherited Resources. Depth-limited to
/// survive circular Parent references in malformed files.
fn resolve_inherited_resources(
    doc: &Document,
    parent_obj: &Object,
    depth: usize,
) -> Option<lopdf::Dictionary> {
    if depth == 0 {
        return None;
    }

    let parent_id = match parent_obj {
        Object::Reference(id) => *id,
        _ => return None,
    };

    let parent = match doc.get_object(parent_id) {
        Ok(Object::Dictionary(d)) => d,
        _ => return None,
    };

    if let Ok(res_obj) = parent.get(b"Resources") {
        if let Some(dict) = resolve_dict_object(doc, res_obj) {
            return Some(dict);
        }
    }

    if let Ok(grandparent_obj) = parent.get(b"Parent") {
        return resolve_inherited_resources(doc, grandparent_obj, depth - 1);
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_font_loads() {
        let font = EmbeddedFont::fallback().unwrap();
        assert!(font.units_per_em() > 0);
        assert!(font.glyph_id('A') > 0);
    }

    #[test]
    fn test_hex_conversion() {
        let font = EmbeddedFont::fallback().unwrap();
        let hex = font.text_to_hex_glyphs("Ab");
        // Four hex digits per character
        assert_eq!(hex.len(), 8);
    }

    #[test]
    fn test_string_width_grows_with_text() {
        let font = EmbeddedFont::fallback().unwrap();
        let short = font.string_width("hi", 12.0);
        let long = font.string_width("hello there", 12.0);
        assert!(long > short);
        assert!(short > 0.0);
    }

    #[test]
    fn test_coverage() {
        let font = EmbeddedFont::fallback().unwrap();
        assert!((font.coverage("plain latin text") - 1.0).abs() < f32::EPSILON);
        assert!((font.coverage("") - 1.0).abs() < f32::EPSILON);
    }
}
