//! Slide Grid CLI tool
//!
//! A command-line tool for merging slide decks into grid handouts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::glob;

use slide_grid::font::FontCandidates;
use slide_grid::layout::{LayoutConfig, LayoutOverrides, PageSize};
use slide_grid::pdf::{extract_metadata, MergeOptions, MergeOutcome, PdfiumRasterizer, SlideMerger};
use slide_grid::server::{self, AppState, ServerConfig, DEFAULT_ALLOWED_ORIGINS, DEFAULT_MAX_UPLOAD_BYTES};

/// Slide Grid - Print several slides per page
#[derive(Parser)]
#[command(name = "slide-grid")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "EXAMPLES:
    # Six slides per A4 page, one title per deck
    slide-grid lecture1.pdf lecture2.pdf -o handout.pdf

    # Numbered decks in order, three columns, landscape Letter
    slide-grid -o handout.pdf --page-size letter --landscape --slides-per-row 3 \"[0-9]*.pdf\"

    # Reuse the options JSON from the web form
    slide-grid merge -o handout.pdf --options options.json *.pdf

    # Serve the merge endpoint for the web front end
    slide-grid serve --bind 127.0.0.1:8000")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Merge arguments used when no subcommand is given
    #[command(flatten)]
    merge: MergeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge slide decks into a grid PDF (the default)
    Merge(MergeArgs),

    /// Serve the merge endpoint over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Browser origin allowed by CORS (repeatable; replaces the defaults)
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,

        /// Maximum request body size in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,

        #[command(flatten)]
        layout: LayoutArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[derive(Args)]
struct MergeArgs {
    /// Input PDF files (in order). Supports glob patterns like "*.pdf"
    inputs: Vec<String>,

    /// Output PDF file path
    #[arg(short, long, default_value = "merged_slides.pdf")]
    output: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    engine: EngineArgs,

    /// Open the output file after creation
    #[arg(long)]
    open: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(size: PageSizeArg) -> Self {
        match size {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

/// Layout settings, applied over the defaults and the --options file
#[derive(Args)]
struct LayoutArgs {
    /// JSON file with layout options, e.g. {"SLIDES_PER_ROW": 3}
    #[arg(long)]
    options: Option<PathBuf>,

    /// Standard page size at 300 DPI
    #[arg(long, value_enum)]
    page_size: Option<PageSizeArg>,

    /// Swap the page size to landscape (A4 unless --page-size is given)
    #[arg(long)]
    landscape: bool,

    /// Output page width in pixels
    #[arg(long)]
    page_width: Option<u32>,

    /// Output page height in pixels
    #[arg(long)]
    page_height: Option<u32>,

    /// Margin around and between slides in pixels
    #[arg(long)]
    margin: Option<u32>,

    /// Height of the title band in pixels
    #[arg(long)]
    title_height: Option<u32>,

    /// Number of slide columns
    #[arg(long)]
    slides_per_row: Option<u32>,

    /// Number of slide rows
    #[arg(long)]
    slides_per_column: Option<u32>,

    /// Rasterization scale relative to the source page size
    #[arg(long)]
    dpi_scale: Option<f32>,

    /// Title font size in pixels
    #[arg(long)]
    title_font_size: Option<f32>,

    /// Output resolution in DPI
    #[arg(long)]
    resolution: Option<f32>,

    /// Leave out the title band
    #[arg(long)]
    no_titles: bool,
}

impl LayoutArgs {
    fn resolve(&self) -> Result<LayoutConfig> {
        let mut layout = LayoutConfig::default();

        if let Some(path) = &self.options {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read options file {}", path.display()))?;
            layout = LayoutOverrides::from_json(&json)?.apply(&layout);
        }

        if self.page_size.is_some() || self.landscape {
            let size = self.page_size.map(PageSize::from).unwrap_or(PageSize::A4);
            layout = layout.with_page_size(size, self.landscape);
        }

        let flags = LayoutOverrides {
            page_width: self.page_width,
            page_height: self.page_height,
            margin: self.margin,
            title_height: self.title_height,
            slides_per_row: self.slides_per_row,
            slides_per_column: self.slides_per_column,
            dpi_scale: self.dpi_scale,
            title_font_size: self.title_font_size,
            show_titles: self.no_titles.then_some(false),
            resolution: self.resolution,
        };
        let layout = flags.apply(&layout);
        layout.validate()?;
        Ok(layout)
    }
}

/// Rendering engine settings
#[derive(Args)]
struct EngineArgs {
    /// Title font file, tried before the built-in fallbacks
    #[arg(long)]
    font: Option<PathBuf>,

    /// Directory containing the PDFium shared library
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Number of worker threads (defaults to one per CPU)
    #[arg(long)]
    workers: Option<usize>,
}

impl EngineArgs {
    fn build_merger(&self) -> Result<SlideMerger> {
        let rasterizer = PdfiumRasterizer::bind(self.pdfium_lib.as_deref())
            .context("Set --pdfium-lib or PDFIUM_LIB_PATH to the directory holding the PDFium library")?;

        let mut fonts = FontCandidates::default();
        if let Some(font) = &self.font {
            fonts = fonts.prefer_file(font.clone());
        }

        Ok(SlideMerger::new(Arc::new(rasterizer), self.workers)?.with_fonts(fonts))
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => cmd_merge(cli.merge),
        Some(Commands::Merge(args)) => cmd_merge(args),
        Some(Commands::Serve { bind, allow_origins, max_upload_bytes, layout, engine }) => {
            cmd_serve(bind, allow_origins, max_upload_bytes, &layout, &engine)
        }
        Some(Commands::Info { input }) => {
            cmd_info(&input)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns in input paths
///
/// Arguments keep their command-line order; the matches of a single pattern
/// are sorted.
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matches = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
                match entry {
                    Ok(path) => matches.push(path),
                    Err(e) => log::warn!("glob error for {}: {}", pattern, e),
                }
            }
            if matches.is_empty() {
                log::warn!("No files matched pattern: {}", pattern);
            }
            matches.sort();
            paths.extend(matches);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Merge slide decks into a grid PDF
fn cmd_merge(args: MergeArgs) -> Result<()> {
    let MergeArgs { inputs, output, layout, engine, open } = args;
    let layout = layout.resolve()?;
    let inputs = expand_globs(inputs)?;

    if inputs.is_empty() {
        println!("No pages created.");
        return Ok(());
    }

    // Validate inputs exist
    for path in &inputs {
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
    }

    let merger = engine.build_merger()?;
    log::info!("Merging {} PDF files on {} workers", inputs.len(), merger.workers());

    let options = MergeOptions {
        input_paths: inputs,
        output_path: output.clone(),
        layout,
    };

    match merger.merge_to_file(&options)? {
        MergeOutcome::Written { page_count, bytes } => {
            println!("PDF created: {} ({} pages, {} bytes)", output.display(), page_count, bytes);
            if open {
                open_file(&output)?;
            }
        }
        MergeOutcome::NoPages => println!("No pages created."),
    }

    Ok(())
}

/// Serve the merge endpoint
fn cmd_serve(
    bind: SocketAddr,
    allow_origins: Vec<String>,
    max_upload_bytes: usize,
    layout: &LayoutArgs,
    engine: &EngineArgs,
) -> Result<()> {
    let layout = layout.resolve()?;
    let config = ServerConfig {
        bind,
        allowed_origins: if allow_origins.is_empty() {
            DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
        } else {
            allow_origins
        },
        max_upload_bytes,
    };
    let state = AppState::new(engine.build_merger()?, layout);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Unable to start the async runtime")?;
    runtime.block_on(server::serve(config, state))?;

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<()> {
    let metadata = extract_metadata(input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(producer) = metadata.producer {
        println!("Producer: {}", producer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_inputs_merge() {
        let cli = Cli::try_parse_from(["slide-grid", "a.pdf", "b.pdf", "-o", "out.pdf"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.merge.inputs, vec!["a.pdf", "b.pdf"]);
        assert_eq!(cli.merge.output, PathBuf::from("out.pdf"));
    }

    #[test]
    fn test_bare_merge_defaults() {
        let cli = Cli::try_parse_from(["slide-grid", "deck.pdf"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.merge.output, PathBuf::from("merged_slides.pdf"));
        assert!(!cli.merge.open);
    }

    #[test]
    fn test_merge_subcommand() {
        let cli = Cli::try_parse_from([
            "slide-grid", "merge", "-o", "out.pdf", "--slides-per-row", "3", "a.pdf",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Merge(args)) => {
                assert_eq!(args.inputs, vec!["a.pdf"]);
                assert_eq!(args.output, PathBuf::from("out.pdf"));
                assert_eq!(args.layout.slides_per_row, Some(3));
            }
            _ => panic!("expected merge subcommand"),
        }
    }

    #[test]
    fn test_serve_and_info_subcommands() {
        let cli = Cli::try_parse_from(["slide-grid", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Some(Commands::Serve { bind, .. }) => assert_eq!(bind.port(), 9000),
            _ => panic!("expected serve subcommand"),
        }

        let cli = Cli::try_parse_from(["slide-grid", "info", "deck.pdf"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Info { input }) if input == PathBuf::from("deck.pdf")));
    }

    #[test]
    fn test_layout_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "slide-grid", "--margin", "20", "--no-titles", "deck.pdf",
        ])
        .unwrap();
        let layout = cli.merge.layout.resolve().unwrap();
        assert_eq!(layout.margin, 20);
        assert!(!layout.show_titles);
        assert_eq!(layout.slides_per_row, LayoutConfig::default().slides_per_row);
    }

    #[test]
    fn test_expand_globs_keeps_argument_order() {
        let temp = TempDir::new().unwrap();
        for name in ["b1.pdf", "a1.pdf", "a2.pdf"] {
            std::fs::write(temp.path().join(name), b"").unwrap();
        }
        let dir = temp.path().display();

        let paths = expand_globs(vec![
            format!("{}/b1.pdf", dir),
            format!("{}/a*.pdf", dir),
        ])
        .unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b1.pdf", "a1.pdf", "a2.pdf"]);
    }
}
