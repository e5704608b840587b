//! Page rasterization using PDFium

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium};

use crate::error::{Error, Result};

/// A decoded bitmap for one source page
pub type SlideImage = DynamicImage;

/// Renders the pages of a source document to bitmaps
pub trait Rasterizer: Send + Sync {
    /// Render every page of the document at `path`, in page order, at `scale`
    /// times its native size
    ///
    /// Called concurrently for different documents.
    fn render_document(&self, path: &Path, scale: f32) -> Result<Vec<SlideImage>>;
}

/// Rasterizer backed by the PDFium shared library
///
/// PDFium is not re-entrant; with the `sync` feature every call into it is
/// serialized, so a document is opened once and its pages rendered in turn.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to PDFium, trying `library_dir` first and then the system library
    pub fn bind(library_dir: Option<&Path>) -> Result<Self> {
        let bindings = match library_dir {
            Some(dir) => {
                let dir = dir.to_string_lossy();
                let library = Pdfium::pdfium_platform_library_name_at_path(&*dir);
                Pdfium::bind_to_library(&library).or_else(|e| {
                    log::warn!("PDFium not found in {}: {}; trying system library", dir, e);
                    Pdfium::bind_to_system_library()
                })
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| Error::Raster(format!("Unable to load the PDFium library: {}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn open(&self, path: &Path) -> Result<PdfDocument<'_>> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        self.pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Error::Raster(format!("Unable to open {}: {}", path.display(), e)))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn render_document(&self, path: &Path, scale: f32) -> Result<Vec<SlideImage>> {
        let document = self.open(path)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);

        document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let bitmap = page.render_with_config(&config).map_err(|e| {
                    Error::Raster(format!("Unable to render page {} of {}: {}", index + 1, path.display(), e))
                })?;

                let width = u32::try_from(bitmap.width())
                    .map_err(|_| Error::Raster("Rendered bitmap has negative width".to_string()))?;
                let height = u32::try_from(bitmap.height())
                    .map_err(|_| Error::Raster("Rendered bitmap has negative height".to_string()))?;

                let pixels = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
                    Error::Raster(format!(
                        "Bitmap for page {} of {} does not match its {}x{} size",
                        index + 1,
                        path.display(),
                        width,
                        height
                    ))
                })?;

                Ok(DynamicImage::ImageRgba8(pixels))
            })
            .collect()
    }
}

/// Rasterizer stand-ins for tests that should not depend on PDFium
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reads a tiny text "document" of the form `"<pages> <marker>"`
    ///
    /// Page `i` renders as a solid 40x30 image with pixel `[marker, i * 20, 0]`,
    /// so tests can tell which document and page ended up where. Documents whose
    /// marker is listed in `slow_markers` render slowly.
    #[derive(Default)]
    pub struct StubRasterizer {
        pub slow_markers: Vec<u8>,
        /// Number of documents opened so far
        pub opened: AtomicUsize,
    }

    impl StubRasterizer {
        pub fn slow(markers: &[u8]) -> Self {
            Self {
                slow_markers: markers.to_vec(),
                ..Self::default()
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    pub fn read_stub(path: &Path) -> Result<(usize, u8)> {
        let text = std::fs::read_to_string(path).map_err(|_| Error::FileNotFound(path.to_path_buf()))?;
        let mut parts = text.split_whitespace();
        let pages = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| Error::Raster(format!("bad stub document {}", path.display())))?;
        let marker = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
        Ok((pages, marker))
    }

    impl Rasterizer for StubRasterizer {
        fn render_document(&self, path: &Path, _scale: f32) -> Result<Vec<SlideImage>> {
            let (pages, marker) = read_stub(path)?;
            self.opened.fetch_add(1, Ordering::SeqCst);

            (0..pages)
                .map(|index| {
                    if self.slow_markers.contains(&marker) {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    let pixel = image::Rgb([marker, (index * 20) as u8, 0]);
                    Ok(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(40, 30, pixel)))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubRasterizer;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stub_renders_marked_pages() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deck.pdf");
        std::fs::write(&path, "2 7").unwrap();

        let stub = StubRasterizer::default();
        let slides = stub.render_document(&path, 1.0).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].to_rgb8().get_pixel(0, 0).0, [7, 20, 0]);
        assert_eq!(stub.opened(), 1);
    }

    #[test]
    fn test_pdfium_missing_file() {
        let rasterizer = match PdfiumRasterizer::bind(None) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Skipping PDFium test: {}", e);
                return;
            }
        };

        let result = rasterizer.render_document(Path::new("nonexistent.pdf"), 1.0);
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
