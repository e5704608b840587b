//! PDF creation from composed page bitmaps using lopdf

use std::io::Cursor;
use std::path::Path;

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::compose::PageImage;
use crate::error::{Error, Result};

/// JPEG quality used for embedded page images
pub const JPEG_QUALITY: u8 = 90;

/// Build a PDF with one full-bleed image page per bitmap
///
/// Page sizes are derived from the bitmap size at `resolution` DPI.
pub fn create_pdf(pages: &[PageImage], resolution: f32) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::General("No pages to write".to_string()));
    }
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(Error::Configuration(format!(
            "resolution must be a positive number, got {}",
            resolution
        )));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (width_px, height_px) = page.dimensions();
        let width_pt = width_px as f32 * 72.0 / resolution;
        let height_pt = height_px as f32 * 72.0 / resolution;

        // Image XObject holding the JPEG data as-is
        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(i64::from(width_px)));
        image_dict.set("Height", Object::Integer(i64::from(height_px)));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let image_id = doc.add_object(Stream::new(image_dict, encode_jpeg(page)?).with_compression(false));

        let content = format!("q\n{:.3} 0 0 {:.3} 0 0 cm\n/Im0 Do\nQ\n", width_pt, height_pt);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::from(width_pt),
                Object::from(height_pt),
            ]),
        );
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Reference(content_id));

        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(kids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_object));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut info = Dictionary::new();
    info.set(
        "Producer",
        Object::String(
            concat!("slide-grid ", env!("CARGO_PKG_VERSION")).as_bytes().to_vec(),
            StringFormat::Literal,
        ),
    );
    info.set(
        "CreationDate",
        Object::String(
            Local::now().format("D:%Y%m%d%H%M%S").to_string().into_bytes(),
            StringFormat::Literal,
        ),
    );
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", Object::Reference(info_id));

    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Write the pages to `output_path`, returning the number of bytes written
pub fn write_pdf(pages: &[PageImage], resolution: f32, output_path: &Path) -> Result<u64> {
    let bytes = create_pdf(pages, resolution)?;
    std::fs::write(output_path, &bytes)?;
    Ok(bytes.len() as u64)
}

fn encode_jpeg(page: &PageImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(page)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::metadata::count_pages_in_bytes;
    use image::{Rgb, RgbImage};

    fn page(shade: u8) -> PageImage {
        RgbImage::from_pixel(120, 160, Rgb([shade, shade, shade]))
    }

    #[test]
    fn test_create_pdf_page_count() {
        let bytes = create_pdf(&[page(10), page(120), page(240)], 300.0).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(count_pages_in_bytes(&bytes).unwrap(), 3);
    }

    #[test]
    fn test_page_size_follows_resolution() {
        let bytes = create_pdf(&[page(0)], 72.0).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 120.0);
        assert_eq!(media_box[3].as_float().unwrap(), 160.0);
    }

    #[test]
    fn test_image_is_embedded_as_jpeg() {
        let bytes = create_pdf(&[page(50)], 300.0).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let jpeg_streams = doc
            .objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|stream| {
                stream
                    .dict
                    .get(b"Filter")
                    .and_then(|f| f.as_name())
                    .map(|name| name == b"DCTDecode")
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(jpeg_streams, 1);
    }

    #[test]
    fn test_empty_page_list_is_rejected() {
        assert!(create_pdf(&[], 300.0).is_err());
    }

    #[test]
    fn test_write_pdf_reports_size() {
        let temp = tempfile::TempDir::new().unwrap();
        let output = temp.path().join("out.pdf");

        let written = write_pdf(&[page(90)], 300.0, &output).unwrap();
        assert_eq!(written, std::fs::metadata(&output).unwrap().len());
    }
}
