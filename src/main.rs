use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "slide-rebuild",
    version,
    about = "Rebuild slide images as an editable PPTX"
)]
struct Cli {
    /// Slide images, in deck order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output presentation path
    #[arg(short = 'o', long = "output", default_value = "output.pptx")]
    output: PathBuf,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Reference text used to correct OCR results
    #[arg(long = "reference")]
    reference: Option<PathBuf>,

    /// Keep the original bitmaps as backgrounds
    #[arg(long = "keep-text")]
    keep_text: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    slide_rebuild::logging::init(cli.verbose)?;

    let mut print_progress = |event: &slide_rebuild::ProgressEvent| {
        eprintln!("[{}] {}", event.stage(), event.describe());
    };
    let task = slide_rebuild::run(
        slide_rebuild::Config {
            images: cli.images,
            output: cli.output,
            settings_path: cli.read_settings,
            reference_path: cli.reference,
            keep_text: cli.keep_text,
        },
        &mut print_progress,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&task)?);
    if task.status == slide_rebuild::TaskStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
