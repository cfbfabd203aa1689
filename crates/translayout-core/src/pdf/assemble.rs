//! Assembly of a new PDF from rendered page images.
//!
//! Each page becomes one JPEG image XObject drawn to fill the page. Page
//! dimensions are derived from the pixel size and the rasterization DPI so
//! the output pages match the input's physical size.

use std::io::Cursor;

use image::RgbImage;
use lopdf::{Document, Object, Stream};

use crate::error::{Error, Result};
use super::document::DocumentMetadata;

/// JPEG quality for page images. High enough that rendered text stays
/// crisp at print resolution.
const JPEG_QUALITY: u8 = 90;

const POINTS_PER_INCH: f32 = 72.0;

/// Build a PDF from page images, carrying over document metadata.
pub fn images_to_pdf(
    pages: &[RgbImage],
    dpi: u32,
    metadata: Option<&DocumentMetadata>,
) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::NoValidPages);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());

    for (i, image) in pages.iter().enumerate() {
        let page_id = add_image_page(&mut doc, pages_id, image, dpi)
            .map_err(|e| Error::PdfSave(format!("Failed to build page {}: {e}", i + 1)))?;
        kids.push(Object::Reference(page_id));
    }

    #[allow(clippy::cast_possible_wrap)]
    let count = kids.len() as i64;
    let pages_dict = lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(count)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    if let Some(metadata) = metadata {
        let info_dict = build_info_dict(metadata);
        if !info_dict.is_empty() {
            let info_id = doc.add_object(Object::Dictionary(info_dict));
            doc.trailer.set("Info", Object::Reference(info_id));
        }
    }

    doc.compress();

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;

    Ok(output)
}

fn add_image_page(
    doc: &mut Document,
    pages_id: lopdf::ObjectId,
    image: &RgbImage,
    dpi: u32,
) -> Result<lopdf::ObjectId> {
    let (px_width, px_height) = image.dimensions();

    let mut jpeg = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    encoder
        .encode(image.as_raw(), px_width, px_height, image::ExtendedColorType::Rgb8)
        .map_err(|e| Error::PdfSave(format!("Failed to encode page image: {e}")))?;

    let image_dict = lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(i64::from(px_width))),
        ("Height", Object::Integer(i64::from(px_height))),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(b"DCTDecode".to_vec())),
    ]);
    // Already JPEG-compressed; a deflate pass would only waste time
    let image_id = doc.add_object(Object::Stream(
        Stream::new(image_dict, jpeg).with_compression(false),
    ));

    #[allow(clippy::cast_precision_loss)]
    let pt_width = px_width as f32 * POINTS_PER_INCH / dpi.max(1) as f32;
    #[allow(clippy::cast_precision_loss)]
    let pt_height = px_height as f32 * POINTS_PER_INCH / dpi.max(1) as f32;

    let content = format!("q\n{pt_width:.2} 0 0 {pt_height:.2} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Object::Stream(Stream::new(
        lopdf::Dictionary::new(),
        content.into_bytes(),
    )));

    let resources = lopdf::Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(lopdf::Dictionary::from_iter([(
            "Im0",
            Object::Reference(image_id),
        )])),
    )]);

    let page_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        ("Resources", Object::Dictionary(resources)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(pt_width),
                Object::Real(pt_height),
            ]),
        ),
    ]));

    Ok(page_id)
}

fn build_info_dict(metadata: &DocumentMetadata) -> lopdf::Dictionary {
    let mut dict = lopdf::Dictionary::new();

    let mut set = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            dict.set(
                key,
                Object::String(v.as_bytes().to_vec(), lopdf::StringFormat::Literal),
            );
        }
    };

    set("Title", &metadata.title);
    set("Author", &metadata.author);
    set("Subject", &metadata.subject);
    set("Keywords", &metadata.keywords);
    set("Creator", &metadata.creator);
    set("Producer", &metadata.producer);
    set("CreationDate", &metadata.creation_date);
    set("ModDate", &metadata.modification_date);

    dict
}
