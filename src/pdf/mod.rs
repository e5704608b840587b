//! PDF input, output and the merge pipeline

pub mod create;
pub mod merge;
pub mod metadata;
pub mod raster;

// Re-export commonly used items
pub use create::{create_pdf, write_pdf};
pub use merge::{document_title, MergeOptions, MergeOutcome, MergedPdf, SlideMerger};
pub use metadata::{count_pages_in_bytes, extract_metadata, PdfMetadata};
pub use raster::{PdfiumRasterizer, Rasterizer, SlideImage};
