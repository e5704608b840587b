//! Grid layout and pagination calculations
//!
//! All coordinates are in output pixels with the origin at the top-left of the
//! page. Slides fill each page column by column: slot `i` lands in row
//! `i % slides_per_column` of column `i / slides_per_column`.

use std::ops::Range;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Length of one separator dash in pixels
pub const DASH_LENGTH: u32 = 5;
/// Gap between separator dashes in pixels
pub const DASH_GAP: u32 = 5;

/// Standard page sizes in pixels at 300 DPI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Portrait (width, height) in pixels
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            PageSize::A4 => (2480, 3508),
            PageSize::Letter => (2550, 3300),
        }
    }
}

/// Layout settings for one merge run
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Output page width in pixels
    pub page_width: u32,
    /// Output page height in pixels
    pub page_height: u32,
    /// Margin around and between slides
    pub margin: u32,
    /// Height of the title band on a document's first page
    pub title_height: u32,
    /// Number of slide columns
    pub slides_per_row: u32,
    /// Number of slide rows
    pub slides_per_column: u32,
    /// Rasterization scale relative to the source page's native size
    pub dpi_scale: f32,
    /// Title glyph size in pixels
    pub title_font_size: f32,
    /// Reserve a title band and draw the document title on first pages
    pub show_titles: bool,
    /// Output resolution used to size PDF pages
    pub resolution: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let (page_width, page_height) = PageSize::A4.dimensions();
        Self {
            page_width,
            page_height,
            margin: 10,
            title_height: 200,
            slides_per_row: 2,
            slides_per_column: 3,
            dpi_scale: 4.0,
            title_font_size: 100.0,
            show_titles: true,
            resolution: 300.0,
        }
    }
}

impl LayoutConfig {
    /// Replace the page dimensions with a standard size
    pub fn with_page_size(mut self, size: PageSize, landscape: bool) -> Self {
        let (width, height) = size.dimensions();
        if landscape {
            self.page_width = height;
            self.page_height = width;
        } else {
            self.page_width = width;
            self.page_height = height;
        }
        self
    }

    /// Number of slides that fit on one page
    pub fn page_capacity(&self) -> usize {
        self.slides_per_row as usize * self.slides_per_column as usize
    }

    /// Number of output pages needed for `total_slides` slides
    pub fn page_count(&self, total_slides: usize) -> usize {
        match self.page_capacity() {
            0 => 0,
            capacity => total_slides.div_ceil(capacity),
        }
    }

    /// Check that every page variant this config can produce has usable cells
    pub fn validate(&self) -> Result<()> {
        if self.page_width == 0 || self.page_height == 0 {
            return Err(Error::Configuration(format!(
                "page size must be positive, got {}x{}",
                self.page_width, self.page_height
            )));
        }
        if self.slides_per_row == 0 || self.slides_per_column == 0 {
            return Err(Error::Configuration(format!(
                "grid must have at least one row and column, got {} per row and {} per column",
                self.slides_per_row, self.slides_per_column
            )));
        }
        if !(self.dpi_scale.is_finite() && self.dpi_scale > 0.0) {
            return Err(Error::Configuration(format!(
                "DPI scale must be a positive number, got {}",
                self.dpi_scale
            )));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(Error::Configuration(format!(
                "resolution must be a positive number, got {}",
                self.resolution
            )));
        }
        if self.show_titles && !(self.title_font_size.is_finite() && self.title_font_size > 0.0) {
            return Err(Error::Configuration(format!(
                "title font size must be a positive number, got {}",
                self.title_font_size
            )));
        }

        self.grid_geometry(false)?;
        if self.show_titles {
            self.grid_geometry(true)?;
        }
        Ok(())
    }

    /// Compute the grid offset and cell size for a page with or without a title band
    pub fn grid_geometry(&self, has_title: bool) -> Result<GridGeometry> {
        let margin = i64::from(self.margin);
        let page_width = i64::from(self.page_width);
        let page_height = i64::from(self.page_height);
        let cols = i64::from(self.slides_per_row);
        let rows = i64::from(self.slides_per_column);

        if cols == 0 || rows == 0 {
            return Err(Error::Configuration(
                "grid must have at least one row and column".to_string(),
            ));
        }

        let (grid_top, available_height) = if has_title {
            let top = margin + i64::from(self.title_height);
            (top, page_height - top - margin)
        } else {
            (margin, page_height - 2 * margin)
        };

        let cell_width = (page_width - (cols + 1) * margin) / cols;
        let cell_height = (available_height - (rows - 1) * margin) / rows;

        if cell_width <= 0 || cell_height <= 0 {
            return Err(Error::Configuration(format!(
                "{}x{} grid does not fit on a {}x{} page with margin {}{} (cells would be {}x{})",
                cols,
                rows,
                page_width,
                page_height,
                margin,
                if has_title {
                    format!(" and title band {}", self.title_height)
                } else {
                    String::new()
                },
                cell_width,
                cell_height,
            )));
        }

        let to_px = |value: i64| {
            u32::try_from(value)
                .map_err(|_| Error::Configuration(format!("grid coordinate {} out of range", value)))
        };

        Ok(GridGeometry {
            grid_top: to_px(grid_top)?,
            cell_width: to_px(cell_width)?,
            cell_height: to_px(cell_height)?,
            margin: self.margin,
            rows: self.slides_per_column,
            cols: self.slides_per_row,
        })
    }

    /// Split `total_slides` slides into output pages
    ///
    /// Only page 0 carries the title band, and only when titles are enabled.
    /// The last page may hold fewer slides than the page capacity.
    pub fn paginate(&self, total_slides: usize) -> Result<Vec<PagePlan>> {
        self.validate()?;

        let capacity = self.page_capacity();
        let first = self.grid_geometry(self.show_titles)?;
        let rest = self.grid_geometry(false)?;

        let plans = (0..self.page_count(total_slides))
            .map(|page_index| {
                let start = page_index * capacity;
                let end = (start + capacity).min(total_slides);
                let has_title = self.show_titles && page_index == 0;
                PagePlan {
                    page_index,
                    has_title,
                    geometry: if page_index == 0 { first } else { rest },
                    slides: start..end,
                }
            })
            .collect();

        Ok(plans)
    }
}

/// Row and column of a slide slot within a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

/// Resolved grid for one page variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    /// Y offset of the first row
    pub grid_top: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    margin: u32,
    rows: u32,
    cols: u32,
}

impl GridGeometry {
    /// Grid position of slot `slot`, filling each column top to bottom
    pub fn cell_position(&self, slot: usize) -> CellPosition {
        let rows = self.rows as usize;
        CellPosition {
            row: (slot % rows) as u32,
            col: (slot / rows) as u32,
        }
    }

    /// Top-left pixel of slot `slot`
    pub fn cell_origin(&self, slot: usize) -> (u32, u32) {
        let CellPosition { row, col } = self.cell_position(slot);
        (
            self.margin + col * (self.cell_width + self.margin),
            self.grid_top + row * (self.cell_height + self.margin),
        )
    }

    /// Y coordinate just below the last row
    pub fn grid_bottom(&self) -> u32 {
        self.grid_top + self.rows * self.cell_height + (self.rows - 1) * self.margin
    }

    /// X coordinates of the separators between adjacent columns
    pub fn separator_xs(&self) -> Vec<u32> {
        (1..self.cols)
            .map(|col| self.margin + col * (self.cell_width + self.margin) - self.margin / 2)
            .collect()
    }

    /// Vertical extents `(start, end)` of the dashes making up one separator
    pub fn separator_dashes(&self) -> Vec<(u32, u32)> {
        let bottom = self.grid_bottom();
        (self.grid_top..bottom)
            .step_by((DASH_LENGTH + DASH_GAP) as usize)
            .map(|y| (y, (y + DASH_LENGTH).min(bottom)))
            .collect()
    }
}

/// One output page of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// Page index within the document's block
    pub page_index: usize,
    /// Whether this page draws the document title
    pub has_title: bool,
    pub geometry: GridGeometry,
    /// Indices of the document's slides placed on this page
    pub slides: Range<usize>,
}

/// Per-invocation overrides, deserialized from the JSON options payload
///
/// Keys follow the upper-case names used by the upload form, e.g.
/// `{"PAGE_WIDTH": 3508, "PAGE_HEIGHT": 2480, "SLIDES_PER_ROW": 3}`.
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LayoutOverrides {
    #[serde(default, deserialize_with = "whole_number")]
    pub page_width: Option<u32>,
    #[serde(default, deserialize_with = "whole_number")]
    pub page_height: Option<u32>,
    #[serde(default, deserialize_with = "whole_number")]
    pub margin: Option<u32>,
    #[serde(default, deserialize_with = "whole_number")]
    pub title_height: Option<u32>,
    #[serde(default, deserialize_with = "whole_number")]
    pub slides_per_row: Option<u32>,
    #[serde(default, deserialize_with = "whole_number")]
    pub slides_per_column: Option<u32>,
    #[serde(default)]
    pub dpi_scale: Option<f32>,
    #[serde(default)]
    pub title_font_size: Option<f32>,
    #[serde(default)]
    pub show_titles: Option<bool>,
    #[serde(default)]
    pub resolution: Option<f32>,
}

impl LayoutOverrides {
    /// Parse the JSON options payload; `null` means no overrides
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<Option<Self>>(json)
            .map(Option::unwrap_or_default)
            .map_err(|e| Error::InvalidInput(format!("Invalid JSON in options field: {}", e)))
    }

    /// Layer these overrides on top of `base`
    pub fn apply(&self, base: &LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            page_width: self.page_width.unwrap_or(base.page_width),
            page_height: self.page_height.unwrap_or(base.page_height),
            margin: self.margin.unwrap_or(base.margin),
            title_height: self.title_height.unwrap_or(base.title_height),
            slides_per_row: self.slides_per_row.unwrap_or(base.slides_per_row),
            slides_per_column: self.slides_per_column.unwrap_or(base.slides_per_column),
            dpi_scale: self.dpi_scale.unwrap_or(base.dpi_scale),
            title_font_size: self.title_font_size.unwrap_or(base.title_font_size),
            show_titles: self.show_titles.unwrap_or(base.show_titles),
            resolution: self.resolution.unwrap_or(base.resolution),
        }
    }
}

/// Accept integral or fractional JSON numbers for pixel counts, truncating fractions
fn whole_number<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) => {
            Ok(Some(value.trunc() as u32))
        }
        Some(value) => Err(D::Error::custom(format!(
            "expected a non-negative whole number, got {}",
            value
        ))),
    }
}
