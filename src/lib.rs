use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod clean;
pub mod correction;
pub mod error;
pub mod logging;
pub mod model;
pub mod noise_filter;
pub mod ocr;
pub mod pipeline;
pub mod pptx;
pub mod providers;
pub mod settings;
pub mod style;
pub mod task;
pub mod text;

pub use clean::BackgroundCleaner;
pub use correction::{ReferenceCorrector, load_reference_text};
pub use error::{ConvertError, StageError};
pub use model::{ConversionResult, SlideData, TextFragment, TextStyle};
pub use noise_filter::NoiseFilter;
pub use ocr::{OcrBackend, TextDetector};
pub use pipeline::{ConvertOptions, Converter, ProgressEvent};
pub use pptx::DeckWriter;
pub use providers::{OpenAI, Provider};
pub use style::StyleMapper;
pub use task::{TaskRecord, TaskStatus};

#[derive(Debug, Clone)]
pub struct Config {
    pub images: Vec<PathBuf>,
    pub output: PathBuf,
    pub settings_path: Option<String>,
    /// Overrides the `.txt` found next to the first image.
    pub reference_path: Option<PathBuf>,
    pub keep_text: bool,
}

/// Loads settings, converts the images and reports the outcome as a task record.
pub async fn run(
    config: Config,
    on_progress: &mut (dyn FnMut(&ProgressEvent) + Send),
) -> Result<TaskRecord> {
    if config.images.is_empty() {
        return Err(anyhow!("no input images"));
    }
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if config.keep_text {
        settings.remove_text = false;
    }

    let reference = match &config.reference_path {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read reference text: {}", path.display()))?,
        ),
        None => load_reference_text(&config.images[0]),
    };

    let mut converter = Converter::from_settings(&settings)?;
    if let Some(reference) = reference {
        info!("using reference text for correction");
        converter = converter.with_reference_text(&reference, settings.similarity_threshold);
    }

    let id = format!("convert-{}", time::OffsetDateTime::now_utc().unix_timestamp());
    let mut task = TaskRecord::new(id);
    task.start();
    let result = converter
        .convert_images(&config.images, &config.output, &mut |event: &ProgressEvent| {
            task.record_progress(event);
            on_progress(event);
        })
        .await;
    task.finish(&result);
    Ok(task)
}
