//! PDF page operations CLI tool
//!
//! A command-line tool for merging, extracting, rotating and watermarking PDF
//! pages, and for building PDFs from text or images.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use pdf_pageops::layout::PageDimensions;
use pdf_pageops::ops::{self, Output, SourceDocument};
use pdf_pageops::pdf::{ImageAsset, ImageFormat, RotationDirection, StandardFont, TextDocumentSpec, WatermarkConfig};

/// PDF Page Ops - Merge, split, rotate and watermark PDF pages
#[derive(Parser)]
#[command(name = "pdf-pageops")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "PAGE RANGES:
    Comma-separated page numbers and ranges, 1-based: \"1,3-5\", \"5-2\", \"all\"

EXAMPLES:
    # Merge numbered PDFs in order
    pdf-pageops merge \"[0-9]*.pdf\" -o handout.pdf

    # Keep pages 1 and 3 to 5
    pdf-pageops extract report.pdf --pages 1,3-5

    # Turn every page a quarter turn counter-clockwise
    pdf-pageops rotate scan.pdf --pages all --direction ccw

    # Stamp a translucent logo and text on every page
    pdf-pageops watermark contract.pdf --text DRAFT --image logo.png --opacity 0.3

    # Typeset a text file on A4 pages
    pdf-pageops text notes.txt --title \"Meeting notes\" --page-size a4")]
struct Cli {
    /// Increase log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge multiple PDF files into one
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path [default: merged-document.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy selected pages into a new PDF
    Extract {
        /// Input PDF file
        input: PathBuf,

        /// Pages to keep, e.g. "1,3-5"
        #[arg(short, long)]
        pages: String,

        /// Output PDF file path [default: extracted_<input>]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate selected pages by a quarter turn
    Rotate {
        /// Input PDF file
        input: PathBuf,

        /// Pages to rotate, e.g. "2,4" or "all"
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Rotation direction
        #[arg(short, long, value_enum, default_value_t = Direction::Cw)]
        direction: Direction,

        /// Output PDF file path [default: rotated_<input>]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Draw text and/or an image over every page
    Watermark {
        /// Input PDF file
        input: PathBuf,

        /// Watermark text (empty for none)
        #[arg(long, default_value = "CONFIDENTIAL")]
        text: String,

        /// Text size in points
        #[arg(long, default_value_t = 48.0)]
        font_size: f32,

        /// Opacity between 0 and 1
        #[arg(long, default_value_t = 0.2)]
        opacity: f32,

        /// PNG or JPEG image drawn centered behind the text
        #[arg(long)]
        image: Option<PathBuf>,

        /// Font: helvetica or times
        #[arg(long, default_value = "helvetica")]
        font: String,

        /// Output PDF file path [default: watermarked_<input>]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Typeset a plain text file into a PDF
    Text {
        /// Text file to read ("-" for stdin)
        input: PathBuf,

        /// Title on the first page
        #[arg(long, default_value = "Document")]
        title: String,

        /// Body text size in points
        #[arg(long, default_value_t = 12.0)]
        font_size: f32,

        /// Font: helvetica or times
        #[arg(long, default_value = "helvetica")]
        font: String,

        /// Page size: a4 or letter
        #[arg(long, default_value = "a4")]
        page_size: String,

        /// Output PDF file path [default: <title>.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a PDF with one page per image
    Images {
        /// PNG or JPEG files (in order). Supports glob patterns like "*.png"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Page size: a4 or letter
        #[arg(long, default_value = "letter")]
        page_size: String,

        /// Output PDF file path [default: images-to-pdf.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-save a PDF with unused objects removed and streams compressed
    Compress {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file path [default: compressed_<input>]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    /// Clockwise
    Cw,
    /// Counter-clockwise
    Ccw,
}

impl From<Direction> for RotationDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Cw => RotationDirection::Clockwise,
            Direction::Ccw => RotationDirection::CounterClockwise,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge { inputs, output } => cmd_merge(inputs, output),
        Commands::Extract { input, pages, output } => cmd_extract(input, pages, output),
        Commands::Rotate {
            input,
            pages,
            direction,
            output,
        } => cmd_rotate(input, pages, direction.into(), output),
        Commands::Watermark {
            input,
            text,
            font_size,
            opacity,
            image,
            font,
            output,
        } => cmd_watermark(input, text, font_size, opacity, image, font, output),
        Commands::Text {
            input,
            title,
            font_size,
            font,
            page_size,
            output,
        } => cmd_text(input, title, font_size, font, page_size, output),
        Commands::Images {
            inputs,
            page_size,
            output,
        } => cmd_images(inputs, page_size, output),
        Commands::Compress { input, output } => cmd_compress(input, output),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("Invalid pattern: {}", pattern))? {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                return Err(pdf_pageops::Error::NoFilesMatched(pattern).into());
            }
            // Sort each pattern's matches; explicit arguments keep their order
            matched.sort();
            paths.extend(matched);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

fn read_source(path: &Path) -> Result<SourceDocument> {
    Ok(SourceDocument::read(path)?)
}

fn read_image(path: &Path) -> Result<ImageAsset> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read image {}", path.display()))?;
    let asset = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => ImageAsset::new(bytes, ImageFormat::from_declared(ext)?),
        None => ImageAsset::sniff(bytes)?,
    };
    Ok(asset)
}

/// Write `output` to `path`, or to its suggested name in the current directory
fn write_output(output: &Output, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.unwrap_or_else(|| PathBuf::from(&output.filename));
    output
        .write_to(&path)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    eprintln!("Output: {}", path.display());
    Ok(path)
}

/// Merge multiple PDFs into one
fn cmd_merge(inputs: Vec<String>, output: Option<PathBuf>) -> Result<()> {
    // Expand glob patterns
    let inputs = expand_globs(inputs)?;
    if inputs.len() < 2 {
        bail!("Select at least two PDF files to merge");
    }

    eprintln!("Merging {} PDF files...", inputs.len());
    let sources = inputs
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>>>()?;

    let merged = ops::merge(&sources)?;
    write_output(&merged, output)?;
    Ok(())
}

/// Copy selected pages into a new PDF
fn cmd_extract(input: PathBuf, pages: String, output: Option<PathBuf>) -> Result<()> {
    let source = read_source(&input)?;

    eprintln!("Extracting pages {}...", pages);
    let extracted = ops::extract(&source, &pages)?;
    write_output(&extracted, output)?;
    Ok(())
}

/// Rotate selected pages
fn cmd_rotate(input: PathBuf, pages: String, direction: RotationDirection, output: Option<PathBuf>) -> Result<()> {
    let source = read_source(&input)?;

    eprintln!("Rotating pages {}...", pages);
    let rotated = ops::rotate(&source, &pages, direction)?;
    write_output(&rotated, output)?;
    Ok(())
}

/// Draw a watermark on every page
fn cmd_watermark(
    input: PathBuf,
    text: String,
    font_size: f32,
    opacity: f32,
    image: Option<PathBuf>,
    font: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = read_source(&input)?;
    let config = WatermarkConfig {
        text,
        font_size,
        opacity,
        image: image.as_deref().map(read_image).transpose()?,
        font: font.parse::<StandardFont>()?,
    };

    eprintln!("Adding watermark...");
    let watermarked = ops::watermark(&source, &config)?;
    write_output(&watermarked, output)?;
    Ok(())
}

/// Typeset a text file
fn cmd_text(
    input: PathBuf,
    title: String,
    font_size: f32,
    font: String,
    page_size: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let text = if input.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Cannot read stdin")?
    } else {
        fs::read_to_string(&input).with_context(|| format!("Cannot read {}", input.display()))?
    };
    let page: PageDimensions = page_size.parse()?;

    let spec = TextDocumentSpec {
        font_size,
        font: font.parse()?,
        ..TextDocumentSpec::from_text(title, &text)
    };

    eprintln!("Typesetting {} lines...", spec.lines.len());
    let document = ops::text_to_pdf(&spec, page)?;
    write_output(&document, output)?;
    Ok(())
}

/// Build a PDF from images
fn cmd_images(inputs: Vec<String>, page_size: String, output: Option<PathBuf>) -> Result<()> {
    let inputs = expand_globs(inputs)?;
    let page: PageDimensions = page_size.parse()?;

    eprintln!("Placing {} images...", inputs.len());
    let images = inputs
        .iter()
        .map(|path| read_image(path))
        .collect::<Result<Vec<_>>>()?;

    let document = ops::images_to_pdf(&images, page)?;
    write_output(&document, output)?;
    Ok(())
}

/// Re-save a PDF compressed
fn cmd_compress(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let source = read_source(&input)?;

    let (compressed, report) = ops::compress(&source)?;
    write_output(&compressed, output)?;

    let saved = report.original_size as i64 - report.compressed_size as i64;
    eprintln!(
        "Size: {} -> {} bytes ({} saved, {} unused objects removed)",
        report.original_size, report.compressed_size, saved, report.removed_objects
    );
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let source = read_source(&input)?;
    let metadata = ops::inspect(&source)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }
    if let Some(producer) = metadata.producer {
        println!("Producer: {}", producer);
    }
    for (index, page) in metadata.pages.iter().enumerate() {
        println!(
            "  Page {}: {:.1} x {:.1} pt, rotated {}",
            index + 1,
            page.width,
            page.height,
            page.rotation
        );
    }

    Ok(())
}
