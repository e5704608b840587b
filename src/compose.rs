//! Output page composition
//!
//! A page is drawn on a white tiny-skia canvas: the optional title first, then
//! every slide stretched to its grid cell, then dashed separators between the
//! columns. The finished canvas is flattened to an RGB bitmap.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rayon::prelude::*;
use tiny_skia::{
    Color, FillRule, IntSize, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::error::{Error, Result};
use crate::font::TitleFont;
use crate::layout::{GridGeometry, LayoutConfig, PagePlan};
use crate::pdf::raster::SlideImage;

/// One fully composed output page
pub type PageImage = RgbImage;

const SEPARATOR_WIDTH: f32 = 2.0;
const SEPARATOR_RGB: [u8; 3] = [0, 0, 255];
const TITLE_RGB: [u8; 3] = [0, 0, 0];

/// Lays slides out on output pages
pub struct PageComposer<'a> {
    config: &'a LayoutConfig,
    font: Option<&'a TitleFont>,
}

impl<'a> PageComposer<'a> {
    /// `font` is required whenever a page plan carries a title
    pub fn new(config: &'a LayoutConfig, font: Option<&'a TitleFont>) -> Self {
        Self { config, font }
    }

    /// Arrange all slides of one document onto as many pages as needed
    ///
    /// Pages are composed in parallel on the current rayon pool and returned in
    /// page order.
    pub fn compose_document(&self, title: &str, slides: Vec<SlideImage>) -> Result<Vec<PageImage>> {
        let plans = self.config.paginate(slides.len())?;

        let mut slides = slides.into_iter();
        let pages: Vec<(PagePlan, Vec<SlideImage>)> = plans
            .into_iter()
            .map(|plan| {
                let group = slides.by_ref().take(plan.slides.len()).collect();
                (plan, group)
            })
            .collect();

        pages
            .into_par_iter()
            .map(|(plan, group)| self.compose_page(&plan, title, group))
            .collect()
    }

    /// Draw one page from its plan and the slides assigned to it
    ///
    /// Slides beyond the page capacity are ignored; missing ones leave their
    /// cells blank.
    pub fn compose_page(&self, plan: &PagePlan, title: &str, slides: Vec<SlideImage>) -> Result<PageImage> {
        let mut canvas = Pixmap::new(self.config.page_width, self.config.page_height).ok_or_else(|| {
            Error::Configuration(format!(
                "cannot allocate a {}x{} page",
                self.config.page_width, self.config.page_height
            ))
        })?;
        canvas.fill(Color::WHITE);

        if plan.has_title {
            self.draw_title(&mut canvas, title)?;
        }

        let geometry = &plan.geometry;
        for (slot, slide) in slides.into_iter().take(self.config.page_capacity()).enumerate() {
            let (x, y) = geometry.cell_origin(slot);
            let cell = fit_to_cell(slide, geometry.cell_width, geometry.cell_height)?;
            canvas.draw_pixmap(
                x as i32,
                y as i32,
                cell.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }

        draw_separators(&mut canvas, geometry);

        Ok(flatten(&canvas))
    }

    fn draw_title(&self, canvas: &mut Pixmap, title: &str) -> Result<()> {
        let font = self.font.ok_or_else(|| Error::FontUnavailable { tried: Vec::new() })?;

        let mut size = self.config.title_font_size;
        let Some(mut path) = font.outline(title, size) else {
            return Ok(());
        };

        // Shrink titles that would run off the page
        let available = self.config.page_width.saturating_sub(2 * self.config.margin) as f32;
        let width = path.bounds().width();
        if width > available && available > 0.0 {
            size *= available / width;
            match font.outline(title, size) {
                Some(smaller) => path = smaller,
                None => return Ok(()),
            }
        }

        let bounds = path.bounds();
        let x = (self.config.page_width as f32 - bounds.width()) / 2.0 - bounds.left();
        let y = self.config.margin as f32
            + (self.config.title_height as f32 - bounds.height()) / 2.0
            - bounds.top();

        let mut paint = Paint::default();
        paint.set_color_rgba8(TITLE_RGB[0], TITLE_RGB[1], TITLE_RGB[2], 255);
        paint.anti_alias = true;

        canvas.fill_path(&path, &paint, FillRule::Winding, Transform::from_translate(x, y), None);
        Ok(())
    }
}

/// Stretch a slide to exactly the cell size, ignoring its aspect ratio
fn fit_to_cell(slide: SlideImage, width: u32, height: u32) -> Result<Pixmap> {
    let resized = imageops::resize(&slide.into_rgb8(), width, height, FilterType::CatmullRom);

    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in resized.pixels() {
        data.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
    }

    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| Error::Configuration(format!("invalid cell size {}x{}", width, height)))?;
    Pixmap::from_vec(data, size)
        .ok_or_else(|| Error::Configuration(format!("invalid cell size {}x{}", width, height)))
}

fn draw_separators(canvas: &mut Pixmap, geometry: &GridGeometry) {
    let dashes = geometry.separator_dashes();
    let mut builder = PathBuilder::new();
    for x in geometry.separator_xs() {
        for &(start, end) in &dashes {
            builder.move_to(x as f32, start as f32);
            builder.line_to(x as f32, end as f32);
        }
    }
    let Some(path) = builder.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(SEPARATOR_RGB[0], SEPARATOR_RGB[1], SEPARATOR_RGB[2], 255);
    let stroke = Stroke {
        width: SEPARATOR_WIDTH,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    };
    canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn flatten(canvas: &Pixmap) -> PageImage {
    let mut page = RgbImage::new(canvas.width(), canvas.height());
    for (dst, src) in page.pixels_mut().zip(canvas.pixels()) {
        let color = src.demultiply();
        *dst = Rgb([color.red(), color.green(), color.blue()]);
    }
    page
}
