use image::{DynamicImage, RgbImage};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clean::BackgroundCleaner;
use crate::correction::ReferenceCorrector;
use crate::error::{ConvertError, degrade_to_identity};
use crate::model::{ConversionResult, SlideData, TextFragment};
use crate::noise_filter::{FilterOutcome, NoiseFilter};
use crate::ocr::{BaiduOcr, TextDetector};
use crate::pptx::DeckWriter;
use crate::providers::build_provider;
use crate::settings::Settings;
use crate::style::StyleMapper;

/// Incremental progress of one deck conversion. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Extracting { page: usize, total: usize },
    Recognizing { page: usize, total: usize },
    Filtering { page: usize, total: usize },
    PageDone { page: usize, total: usize, fragment_count: usize },
    Generating { total: usize },
}

impl ProgressEvent {
    pub fn stage(&self) -> &'static str {
        match self {
            ProgressEvent::Extracting { .. } => "extracting",
            ProgressEvent::Recognizing { .. } => "ocr",
            ProgressEvent::Filtering { .. } => "llm_filter",
            ProgressEvent::PageDone { .. } => "page_done",
            ProgressEvent::Generating { .. } => "generating",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::Extracting { page, .. } => format!("读取第 {} 页图片...", page),
            ProgressEvent::Recognizing { page, .. } => format!("识别第 {} 页文字...", page),
            ProgressEvent::Filtering { page, .. } => format!("过滤第 {} 页噪声文字...", page),
            ProgressEvent::PageDone { page, .. } => format!("第 {} 页完成", page),
            ProgressEvent::Generating { .. } => "正在生成 PPTX 文件...".to_string(),
        }
    }

    fn position(&self) -> (usize, usize) {
        match *self {
            ProgressEvent::Extracting { page, total }
            | ProgressEvent::Recognizing { page, total }
            | ProgressEvent::Filtering { page, total }
            | ProgressEvent::PageDone { page, total, .. } => (page, total),
            ProgressEvent::Generating { total } => (total, total),
        }
    }

    /// The payload a task record stores as its progress.
    pub fn to_json(&self) -> Value {
        let (current_page, total) = self.position();
        let mut value = json!({
            "current_page": current_page,
            "total": total,
            "stage": self.stage(),
            "stage_name": self.describe(),
        });
        if let ProgressEvent::PageDone { fragment_count, .. } = self {
            value["text_blocks_count"] = json!(fragment_count);
        }
        value
    }
}

/// Per-slide state, logged as a slide moves through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlideState {
    Detecting,
    Filtering,
    Correcting,
    Styling,
    Cleaning,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub confidence_threshold: f32,
    /// Replace the background with a cleaned copy that has the text pixels removed.
    pub remove_text: bool,
    /// Where cleaned backgrounds go. Defaults to next to each source image.
    pub work_dir: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            remove_text: true,
            work_dir: None,
        }
    }
}

/// Drives every stage for a deck of slide images, one slide at a time.
#[derive(Clone)]
pub struct Converter {
    detector: TextDetector,
    noise_filter: Option<NoiseFilter>,
    corrector: Option<ReferenceCorrector>,
    style: StyleMapper,
    cleaner: BackgroundCleaner,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(detector: TextDetector) -> Self {
        Self {
            detector,
            noise_filter: None,
            corrector: None,
            style: StyleMapper::new(),
            cleaner: BackgroundCleaner::new(),
            options: ConvertOptions::default(),
        }
    }

    /// Wires the Baidu client and, when configured, the reasoning provider.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConvertError> {
        settings
            .validate()
            .map_err(|err| ConvertError::Config(err.to_string()))?;
        let credentials = settings.ocr_credentials().ok_or_else(|| {
            ConvertError::Config(
                "ocr credentials missing: set BAIDU_OCR_API_KEY and BAIDU_OCR_SECRET_KEY".to_string(),
            )
        })?;
        let backend = BaiduOcr::new(credentials).map_err(|err| ConvertError::Config(err.to_string()))?;
        let detector = TextDetector::new(Arc::new(backend)).with_limits(settings.ocr_limits);

        let mut converter = Converter::new(detector)
            .with_style_mapper(StyleMapper::new().with_visual_classifier(settings.visual_classifier))
            .with_options(ConvertOptions {
                confidence_threshold: settings.confidence_threshold,
                remove_text: settings.remove_text,
                work_dir: settings.work_dir.clone(),
            });
        match settings.reasoning_config() {
            Some(config) => {
                info!("noise filter enabled ({})", config.model);
                converter = converter.with_noise_filter(NoiseFilter::new(Arc::new(build_provider(config))));
            }
            None => debug!("noise filter disabled"),
        }
        Ok(converter)
    }

    pub fn with_noise_filter(mut self, filter: NoiseFilter) -> Self {
        self.noise_filter = Some(filter);
        self
    }

    pub fn with_corrector(mut self, corrector: ReferenceCorrector) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Blank reference text leaves correction off.
    pub fn with_reference_text(self, reference: &str, similarity_threshold: f64) -> Self {
        if reference.trim().is_empty() {
            return self;
        }
        self.with_corrector(ReferenceCorrector::new(reference).with_threshold(similarity_threshold))
    }

    pub fn with_style_mapper(mut self, style: StyleMapper) -> Self {
        self.style = style;
        self
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// Converts `paths` into one presentation at `output`, in input order.
    ///
    /// Unreadable images are skipped. A slide whose detection fails keeps its
    /// original background and no text. Only emission failures fail the deck.
    pub async fn convert_images(
        &self,
        paths: &[PathBuf],
        output: &Path,
        progress: &mut (dyn FnMut(&ProgressEvent) + Send),
    ) -> ConversionResult {
        let total = paths.len();
        let title = output
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut deck = DeckWriter::new().with_title(title);
        let run_dir = self.run_dir();
        let mut text_blocks_count = 0;

        for (idx, path) in paths.iter().enumerate() {
            let page = idx + 1;
            progress(&ProgressEvent::Extracting { page, total });
            let image = match image::open(path) {
                Ok(image) => image,
                Err(err) => {
                    warn!("page {}: skipping unreadable image {}: {}", page, path.display(), err);
                    continue;
                }
            };
            let (slide, cleaned) = self
                .convert_slide(page, total, path, &image, run_dir.as_deref(), progress)
                .await;
            let added = match &cleaned {
                Some(background) => deck.add_slide_with_background(&slide, background),
                None => deck.add_slide(&slide),
            };
            if let Err(err) = added {
                let err = ConvertError::Emit(err);
                warn!("page {}: {}", page, err);
                return ConversionResult::failed(err.to_string());
            }
            text_blocks_count += slide.fragments.len();
            progress(&ProgressEvent::PageDone {
                page,
                total,
                fragment_count: slide.fragments.len(),
            });
        }

        if deck.slide_count() == 0 {
            return ConversionResult::failed("no readable slide images");
        }

        progress(&ProgressEvent::Generating { total });
        let slides_count = deck.slide_count();
        match deck.save(output) {
            Ok(path) => {
                info!(
                    "converted {} slides with {} text blocks",
                    slides_count, text_blocks_count
                );
                ConversionResult::succeeded(path, slides_count, text_blocks_count)
            }
            Err(err) => {
                let err = ConvertError::Emit(err);
                warn!("{}", err);
                ConversionResult::failed(err.to_string())
            }
        }
    }

    /// A fresh directory under `work_dir` for this run's cleaned backgrounds, so
    /// concurrent decks never write the same file.
    fn run_dir(&self) -> Option<PathBuf> {
        if !self.options.remove_text {
            return None;
        }
        let work_dir = self.options.work_dir.as_deref()?;
        let created = std::fs::create_dir_all(work_dir).and_then(|()| {
            tempfile::Builder::new()
                .prefix("run-")
                .keep(true)
                .tempdir_in(work_dir)
        });
        match created {
            Ok(dir) => Some(dir.path().to_path_buf()),
            Err(err) => {
                warn!(
                    "cannot use work dir {}, writing next to sources: {}",
                    work_dir.display(),
                    err
                );
                None
            }
        }
    }

    /// Returns the slide and, when text was removed, its cleaned background.
    async fn convert_slide(
        &self,
        page: usize,
        total: usize,
        path: &Path,
        image: &DynamicImage,
        run_dir: Option<&Path>,
        progress: &mut (dyn FnMut(&ProgressEvent) + Send),
    ) -> (SlideData, Option<RgbImage>) {
        let (width, height) = (image.width(), image.height());
        let mut slide = SlideData {
            index: page,
            image_path: path.to_path_buf(),
            width,
            height,
            fragments: Vec::new(),
        };

        trace_state(page, SlideState::Detecting);
        progress(&ProgressEvent::Recognizing { page, total });
        let fragments = match self
            .detector
            .detect_image(image, self.options.confidence_threshold)
            .await
        {
            Ok(fragments) => fragments,
            Err(err) => {
                warn!("page {}: text detection failed: {}", page, err);
                trace_state(page, SlideState::Failed);
                return (slide, None);
            }
        };

        let fragments = match &self.noise_filter {
            Some(filter) if !fragments.is_empty() => {
                trace_state(page, SlideState::Filtering);
                progress(&ProgressEvent::Filtering { page, total });
                let result = filter.filter(&fragments).await;
                let outcome = degrade_to_identity("noise filter", page, result, || {
                    FilterOutcome::keep_all(fragments)
                });
                if outcome.filtered_count > 0 {
                    info!("page {}: filtered {} noise fragments", page, outcome.filtered_count);
                }
                outcome.kept
            }
            _ => fragments,
        };

        let fragments = match &self.corrector {
            Some(corrector) => {
                trace_state(page, SlideState::Correcting);
                corrector.correct(fragments, Some(page))
            }
            None => fragments,
        };

        trace_state(page, SlideState::Styling);
        let pixels = image.to_rgb8();
        let fragments = self.style.map_slide(&pixels, fragments);

        let mut cleaned = None;
        if self.options.remove_text && !fragments.is_empty() {
            trace_state(page, SlideState::Cleaning);
            let bboxes: Vec<_> = fragments.iter().map(TextFragment::bbox).collect();
            let background = self.cleaner.clean(&pixels, &bboxes);
            let target = processed_path(path, page, run_dir);
            if save_background(page, &background, &target) {
                slide.image_path = target;
            }
            cleaned = Some(background);
        }

        slide.fragments = fragments;
        trace_state(page, SlideState::Done);
        (slide, cleaned)
    }
}

/// Keeps a copy of the cleaned bitmap on disk. The deck embeds the in-memory
/// bitmap either way.
fn save_background(page: usize, background: &RgbImage, target: &Path) -> bool {
    if let Some(dir) = target.parent()
        && let Err(err) = std::fs::create_dir_all(dir)
    {
        warn!("page {}: cannot create {}: {}", page, dir.display(), err);
        return false;
    }
    match background.save(target) {
        Ok(()) => {
            debug!("page {}: cleaned background at {}", page, target.display());
            true
        }
        Err(err) => {
            warn!("page {}: failed to save cleaned background: {}", page, err);
            false
        }
    }
}

fn trace_state(page: usize, state: SlideState) {
    debug!("page {}: {:?}", page, state);
}

/// `<page>_<stem>.processed.png`, next to the source or inside `dir`.
pub fn processed_path(source: &Path, page: usize, dir: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slide".to_string());
    let name = format!("{:03}_{}.processed.png", page, stem);
    match dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}
