use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docforge_core::document;
use docforge_core::upload::DOCUMENT_RULE;
use docforge_core::{ConversionRequest, Converter, ModelKind, UploadedFile, Uploads};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "docforge",
    about = "Convert markdown to PDF and clean masked image regions",
    version,
    author
)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a markdown (.md/.txt) file to PDF
    Convert {
        /// Markdown input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Write the standalone HTML rendering instead of a PDF
        #[arg(long)]
        html: bool,
    },

    /// Inpaint the region of an image selected by a mask
    Clean {
        /// Image to clean
        image: PathBuf,

        /// Mask image; white pixels mark the region to remove
        mask: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Inpainting model (telea or diffusion)
        #[arg(short, long, default_value_t = ModelKind::Telea)]
        model: ModelKind,
    },
}

/// Read `path` the way the server receives an upload: bytes plus filename.
fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(filename, bytes))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("docforge_core=debug"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Convert {
            input,
            output,
            html,
        } => {
            let mut uploads = Uploads::new();
            uploads.insert("file", read_upload(&input)?);
            let file = uploads.take(&DOCUMENT_RULE)?;

            if html {
                let text = document::decode_text(&file.bytes)?;
                write_output(&output, document::markdown_to_html(text).as_bytes())?;
                println!("HTML written to {}", output.display());
            } else {
                let request = ConversionRequest::Markdown { source: file.bytes };
                let result = Converter::with_model(ModelKind::default()).convert(request)?;
                write_output(&output, &result.bytes)?;
                println!("PDF written to {} ({} bytes)", output.display(), result.bytes.len());
            }
        }

        Commands::Clean {
            image,
            mask,
            output,
            model,
        } => {
            let mut uploads = Uploads::new();
            uploads.insert("image", read_upload(&image)?);
            uploads.insert("mask", read_upload(&mask)?);
            let request = ConversionRequest::clean(uploads)?;

            let result = Converter::with_model(model).convert(request)?;
            write_output(&output, &result.bytes)?;
            println!("Cleaned image written to {} (model: {model})", output.display());
        }
    }

    Ok(())
}
