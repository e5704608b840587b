//! Error types for the slide-grid library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the slide-grid library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Rejected upload or options payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// None of the title font candidates could be loaded
    #[error("No usable title font found (tried: {})", .tried.join(", "))]
    FontUnavailable { tried: Vec<String> },

    /// Layout settings that cannot produce a usable grid
    #[error("Invalid layout configuration: {0}")]
    Configuration(String),

    /// PDFium binding, loading or rendering failure
    #[error("Rasterization failed: {0}")]
    Raster(String),

    /// A document's rasterize/compose pipeline failed
    #[error("Failed to process {}: {source}", .document.display())]
    Pipeline {
        document: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by processing.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::InvalidInput(_) | Error::Configuration(_) | Error::FileNotFound(_) => true,
            Error::Pipeline { source, .. } => source.is_client_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_unavailable_lists_candidates() {
        let err = Error::FontUnavailable {
            tried: vec!["arial.ttf".to_string(), "DejaVuSans-Bold.ttf".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "No usable title font found (tried: arial.ttf, DejaVuSans-Bold.ttf)"
        );
    }

    #[test]
    fn test_pipeline_error_names_document() {
        let err = Error::Pipeline {
            document: PathBuf::from("decks/lecture1.pdf"),
            source: Box::new(Error::Raster("bad xref".to_string())),
        };
        let message = err.to_string();
        assert!(message.contains("lecture1.pdf"));
        assert!(message.contains("bad xref"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidInput("x".into()).is_client_error());
        assert!(Error::Configuration("x".into()).is_client_error());
        assert!(!Error::Raster("x".into()).is_client_error());
        assert!(!Error::FontUnavailable { tried: vec![] }.is_client_error());
    }
}
