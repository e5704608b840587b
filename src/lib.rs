//! Slide Grid Library
//!
//! Turns slide-deck PDFs into printable handouts with several slides per page.
//! This library provides functionality to:
//! - Rasterize source pages through PDFium
//! - Lay slides out in a column-major grid with a per-document title
//! - Write the composed pages to a new PDF
//! - Serve the merge over HTTP
//!
//! # Example
//!
//! ```no_run
//! use slide_grid::layout::LayoutConfig;
//! use slide_grid::pdf::{MergeOptions, PdfiumRasterizer, SlideMerger};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let rasterizer = Arc::new(PdfiumRasterizer::bind(None).expect("PDFium not available"));
//! let merger = SlideMerger::new(rasterizer, Some(4)).expect("Failed to start workers");
//!
//! let options = MergeOptions {
//!     input_paths: vec![
//!         PathBuf::from("1. intro.pdf"),
//!         PathBuf::from("2. advanced.pdf"),
//!     ],
//!     output_path: PathBuf::from("merged_slides.pdf"),
//!     layout: LayoutConfig::default(),
//! };
//!
//! merger.merge_to_file(&options).expect("Failed to merge slides");
//! ```

pub mod compose;
pub mod error;
pub mod font;
pub mod layout;
pub mod pdf;
pub mod server;

// Re-export commonly used items
pub use error::{Error, Result};
