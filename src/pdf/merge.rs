//! Grid merging of slide decks
//!
//! Every input document runs through rasterize → paginate → compose on a
//! shared bounded worker pool. Documents are processed concurrently, each one
//! rasterized from a single open handle and its pages composed in parallel.
//! Results are collected by index, so the merged output always follows the
//! input order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::compose::{PageComposer, PageImage};
use crate::error::{Error, Result};
use crate::font::{FontCandidates, TitleFont};
use crate::layout::LayoutConfig;
use crate::pdf::create::{create_pdf, write_pdf};
use crate::pdf::raster::Rasterizer;

/// Options for merging slide decks into a grid PDF
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Input PDF file paths in the order they should appear
    pub input_paths: Vec<PathBuf>,
    /// Output PDF file path
    pub output_path: PathBuf,
    /// Grid and page settings
    pub layout: LayoutConfig,
}

/// Result of a merge that writes to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merged PDF was written
    Written { page_count: usize, bytes: u64 },
    /// There was nothing to merge; no file was written
    NoPages,
}

/// A merged PDF held in memory
#[derive(Debug, Clone)]
pub struct MergedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Title shown for a document: its file name without the extension
pub fn document_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs grid merges on a bounded worker pool
pub struct SlideMerger {
    rasterizer: Arc<dyn Rasterizer>,
    pool: ThreadPool,
    fonts: FontCandidates,
    title_font: Mutex<Option<Arc<TitleFont>>>,
}

impl SlideMerger {
    /// Create a merger with `workers` threads (defaults to one per CPU)
    pub fn new(rasterizer: Arc<dyn Rasterizer>, workers: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("slide-grid-{}", i));
        if let Some(workers) = workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::General(format!("Unable to start worker pool: {}", e)))?;

        Ok(Self {
            rasterizer,
            pool,
            fonts: FontCandidates::default(),
            title_font: Mutex::new(None),
        })
    }

    /// Use `fonts` instead of the default title font candidates
    pub fn with_fonts(mut self, fonts: FontCandidates) -> Self {
        self.fonts = fonts;
        self.title_font = Mutex::new(None);
        self
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn title_font(&self) -> Result<Arc<TitleFont>> {
        let mut cached = self
            .title_font
            .lock()
            .map_err(|_| Error::General("Title font cache is poisoned".to_string()))?;
        if let Some(font) = cached.as_ref() {
            return Ok(Arc::clone(font));
        }

        let font = Arc::new(self.fonts.resolve()?);
        *cached = Some(Arc::clone(&font));
        Ok(font)
    }

    /// Rasterize and lay out every document, returning all pages in input order
    ///
    /// An empty input list is a no-op. Otherwise the layout is validated,
    /// inputs are checked to exist, and the title font is resolved before any
    /// document is processed. The first failing document aborts the whole run.
    pub fn render_documents(&self, paths: &[PathBuf], layout: &LayoutConfig) -> Result<Vec<PageImage>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        layout.validate()?;
        if let Some(missing) = paths.iter().find(|path| !path.exists()) {
            return Err(Error::FileNotFound(missing.clone()));
        }

        let font = if layout.show_titles {
            Some(self.title_font()?)
        } else {
            None
        };
        let composer = PageComposer::new(layout, font.as_deref());

        let documents: Vec<Vec<PageImage>> = self.pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    self.render_document(path, layout, &composer)
                        .map_err(|e| Error::Pipeline {
                            document: path.clone(),
                            source: Box::new(e),
                        })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(documents.into_iter().flatten().collect())
    }

    fn render_document(
        &self,
        path: &Path,
        layout: &LayoutConfig,
        composer: &PageComposer<'_>,
    ) -> Result<Vec<PageImage>> {
        let title = document_title(path);
        log::info!("Processing {} ...", title);

        let slides = self.rasterizer.render_document(path, layout.dpi_scale)?;
        let slide_count = slides.len();

        let pages = composer.compose_document(&title, slides)?;
        log::debug!("{}: {} slides on {} pages", title, slide_count, pages.len());
        Ok(pages)
    }

    /// Merge the documents into an in-memory PDF
    ///
    /// Returns `None` when there is nothing to write.
    pub fn merge_to_bytes(&self, paths: &[PathBuf], layout: &LayoutConfig) -> Result<Option<MergedPdf>> {
        let pages = self.render_documents(paths, layout)?;
        if pages.is_empty() {
            log::info!("No pages created.");
            return Ok(None);
        }

        let bytes = create_pdf(&pages, layout.resolution)?;
        Ok(Some(MergedPdf {
            page_count: pages.len(),
            bytes,
        }))
    }

    /// Merge the documents and write the result to `options.output_path`
    pub fn merge_to_file(&self, options: &MergeOptions) -> Result<MergeOutcome> {
        let pages = self.render_documents(&options.input_paths, &options.layout)?;
        if pages.is_empty() {
            log::info!("No pages created.");
            return Ok(MergeOutcome::NoPages);
        }

        let bytes = write_pdf(&pages, options.layout.resolution, &options.output_path)?;
        log::info!("PDF created: {}", options.output_path.display());
        Ok(MergeOutcome::Written {
            page_count: pages.len(),
            bytes,
        })
    }
}
