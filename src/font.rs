//! Title font discovery and text outlining
//!
//! Title fonts are resolved from a prioritized list of candidates. The first
//! candidate that loads as a valid font face wins. Named candidates are looked
//! up in the working directory and then searched (case-insensitively) under the
//! platform font directories.

use std::fmt;
use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use rustybuzz::ttf_parser::{GlyphId, OutlineBuilder};
use rustybuzz::{Face, UnicodeBuffer};
use tiny_skia_path::{Path as OutlinePath, PathBuilder, Transform};

use crate::error::{Error, Result};

/// Font files tried for titles when nothing else is configured
pub const DEFAULT_TITLE_FONTS: &[&str] = &[
    "times_new_roman.ttf",
    "Times New Roman.ttf",
    "times.ttf",
    "arial.ttf",
    "DejaVuSans-Bold.ttf",
    "LiberationSerif-Regular.ttf",
];

/// One entry in the font fallback list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontCandidate {
    /// An explicit font file
    File(PathBuf),
    /// A font file name to search for
    Named(String),
}

impl fmt::Display for FontCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontCandidate::File(path) => write!(f, "{}", path.display()),
            FontCandidate::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Prioritized font candidates plus the directories searched for named ones
#[derive(Debug, Clone)]
pub struct FontCandidates {
    candidates: Vec<FontCandidate>,
    search_dirs: Vec<PathBuf>,
}

impl Default for FontCandidates {
    fn default() -> Self {
        Self::new(
            DEFAULT_TITLE_FONTS
                .iter()
                .map(|name| FontCandidate::Named(name.to_string()))
                .collect(),
            system_font_dirs(),
        )
    }
}

impl FontCandidates {
    pub fn new(candidates: Vec<FontCandidate>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            search_dirs,
        }
    }

    /// Try `path` before every other candidate
    pub fn prefer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.insert(0, FontCandidate::File(path.into()));
        self
    }

    /// Load the first candidate that parses as a font
    pub fn resolve(&self) -> Result<TitleFont> {
        for candidate in &self.candidates {
            if let Some(font) = self.load(candidate) {
                log::debug!("Using title font {}", font.source().display());
                return Ok(font);
            }
            log::debug!("Title font candidate {} not usable", candidate);
        }

        Err(Error::FontUnavailable {
            tried: self.candidates.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn load(&self, candidate: &FontCandidate) -> Option<TitleFont> {
        match candidate {
            FontCandidate::File(path) => TitleFont::from_file(path).ok(),
            FontCandidate::Named(name) => {
                let local = Path::new(name);
                if local.is_file() {
                    if let Ok(font) = TitleFont::from_file(local) {
                        return Some(font);
                    }
                }
                self.search(name)
            }
        }
    }

    fn search(&self, name: &str) -> Option<TitleFont> {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        for dir in self.search_dirs.iter().filter(|dir| dir.is_dir()) {
            let pattern = format!(
                "{}/**/{}",
                Pattern::escape(&dir.to_string_lossy()),
                Pattern::escape(name)
            );
            let Ok(entries) = glob_with(&pattern, options) else {
                continue;
            };
            for path in entries.flatten() {
                if let Ok(font) = TitleFont::from_file(&path) {
                    return Some(font);
                }
            }
        }
        None
    }
}

/// Platform font directories that exist on this machine
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local/share/fonts"));
        }
    }
    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/Library/Fonts"));
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            dirs.push(home.join("Library/Fonts"));
        }
    }
    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Windows"));
        dirs.push(windir.join("Fonts"));
    }

    dirs.retain(|dir| dir.is_dir());
    dirs
}

/// A loaded font used to draw document titles
#[derive(Clone)]
pub struct TitleFont {
    source: PathBuf,
    data: Vec<u8>,
}

impl fmt::Debug for TitleFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitleFont")
            .field("source", &self.source)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl TitleFont {
    /// Load a font file, checking that it parses
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(path, data)
    }

    /// Wrap font data read elsewhere; `source` is only used for reporting
    pub fn from_bytes(source: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let source = source.into();
        if Face::from_slice(&data, 0).is_none() {
            return Err(Error::General(format!(
                "Not a usable font file: {}",
                source.display()
            )));
        }
        Ok(Self { source, data })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Shape `text` and return its glyph outlines at `size` pixels
    ///
    /// The path uses y-down pixel coordinates with the pen starting at the
    /// origin on the baseline. Returns `None` when nothing visible is drawn.
    pub fn outline(&self, text: &str, size: f32) -> Option<OutlinePath> {
        let face = Face::from_slice(&self.data, 0)?;

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let shaped = rustybuzz::shape(&face, &[], buffer);

        let scale = size / face.units_per_em() as f32;
        let mut text_path = PathBuilder::new();
        let mut pen_x = 0.0;

        for (info, pos) in shaped.glyph_infos().iter().zip(shaped.glyph_positions()) {
            let mut glyph = GlyphOutline(PathBuilder::new());
            let glyph_id = GlyphId(info.glyph_id as u16);

            if face.outline_glyph(glyph_id, &mut glyph).is_some() {
                let x = pen_x + pos.x_offset as f32 * scale;
                let y = -(pos.y_offset as f32) * scale;
                // Font units are y-up
                let transform = Transform::from_row(scale, 0.0, 0.0, -scale, x, y);
                if let Some(path) = glyph.0.finish().and_then(|p| p.transform(transform)) {
                    text_path.push_path(&path);
                }
            }

            pen_x += pos.x_advance as f32 * scale;
        }

        text_path.finish()
    }
}

struct GlyphOutline(PathBuilder);

impl OutlineBuilder for GlyphOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}
