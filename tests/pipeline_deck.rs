use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use slide_rebuild::error::StageError;
use slide_rebuild::ocr::{OcrBackend, OcrFuture, PreparedImage, RawTextRun};
use slide_rebuild::providers::{Provider, ProviderFuture};
use slide_rebuild::{Converter, ConvertOptions, NoiseFilter, ProgressEvent, TextDetector};
use zip::ZipArchive;

struct TwoRuns;

impl OcrBackend for TwoRuns {
    fn name(&self) -> &str {
        "two-runs"
    }

    fn recognize<'a>(&'a self, _image: &'a PreparedImage) -> OcrFuture<'a> {
        Box::pin(async {
            Ok(vec![
                run("人工智能的未来", 20.0, 10.0, 120.0, 20.0),
                run("重新思考学习的本质", 20.0, 60.0, 150.0, 16.0),
            ])
        })
    }
}

/// Fails every second call.
struct Flaky(AtomicUsize);

impl OcrBackend for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn recognize<'a>(&'a self, _image: &'a PreparedImage) -> OcrFuture<'a> {
        let call = self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call % 2 == 1 {
                return Err(StageError::Ocr("quota exceeded".to_string()));
            }
            Ok(vec![run("人工智能的未来", 20.0, 10.0, 120.0, 20.0)])
        })
    }
}

struct KeepFirst;

impl Provider for KeepFirst {
    fn name(&self) -> &str {
        "keep-first"
    }

    fn complete<'a>(&'a self, _prompt: String) -> ProviderFuture<'a> {
        Box::pin(async { Ok("0".to_string()) })
    }
}

fn run(text: &str, left: f64, top: f64, width: f64, height: f64) -> RawTextRun {
    RawTextRun {
        text: text.to_string(),
        left,
        top,
        width,
        height,
        confidence: 0.9,
    }
}

fn write_slides(dir: &Path, count: usize) -> Vec<PathBuf> {
    (1..=count)
        .map(|page| {
            let path = dir.join(format!("page_{:03}.png", page));
            RgbImage::from_fn(320, 180, |x, y| {
                if (14..26).contains(&y) && (24..130).contains(&x) && x % 6 < 2 {
                    Rgb([20, 20, 20])
                } else {
                    Rgb([240, 240, 235])
                }
            })
            .save(&path)
            .unwrap();
            path
        })
        .collect()
}

fn write_solid(path: &Path, color: [u8; 3]) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(320, 180, Rgb(color)).save(path).unwrap();
    path.to_path_buf()
}

/// Corner pixel of the background embedded in slide `number`.
fn slide_corner(output: &Path, number: usize) -> [u8; 3] {
    let mut archive = ZipArchive::new(std::fs::File::open(output).unwrap()).unwrap();
    let name = archive
        .file_names()
        .find(|name| name.starts_with(&format!("ppt/media/image{}.", number)))
        .unwrap()
        .to_string();
    let mut bytes = Vec::new();
    archive.by_name(&name).unwrap().read_to_end(&mut bytes).unwrap();
    let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
    image.get_pixel(image.width() - 1, image.height() - 1).0
}

fn assert_dominant(pixel: [u8; 3], channel: usize) {
    for (idx, value) in pixel.iter().enumerate() {
        if idx == channel {
            assert!(*value > 200, "{:?}", pixel);
        } else {
            assert!(*value < 60, "{:?}", pixel);
        }
    }
}

fn slide_xml(output: &Path, number: usize) -> String {
    let mut archive = ZipArchive::new(std::fs::File::open(output).unwrap()).unwrap();
    let mut xml = String::new();
    archive
        .by_name(&format!("ppt/slides/slide{}.xml", number))
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

#[tokio::test]
async fn three_slides_with_two_fragments_each() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_slides(dir.path(), 3);
    let output = dir.path().join("deck.pptx");
    let converter = Converter::new(TextDetector::new(Arc::new(TwoRuns)));

    let mut events = Vec::new();
    let result = converter
        .convert_images(&images, &output, &mut |event: &ProgressEvent| {
            events.push(event.clone())
        })
        .await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.slides_count, 3);
    assert_eq!(result.text_blocks_count, 6);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    for number in 1..=3 {
        let xml = slide_xml(&output, number);
        assert_eq!(xml.matches("<p:pic>").count(), 1);
        assert_eq!(xml.matches("<p:sp>").count(), 2);
        assert!(xml.contains("人工智能的未来"));
    }
    for (idx, image) in images.iter().enumerate() {
        let stem = image.file_stem().unwrap().to_string_lossy().into_owned();
        assert!(dir.path().join(format!("{:03}_{}.processed.png", idx + 1, stem)).exists());
    }

    let stages: Vec<_> = events.iter().map(ProgressEvent::stage).collect();
    assert_eq!(&stages[..3], ["extracting", "ocr", "page_done"]);
    assert_eq!(stages.last(), Some(&"generating"));
    assert_eq!(stages.iter().filter(|stage| **stage == "page_done").count(), 3);
}

#[tokio::test]
async fn failed_detection_keeps_a_blank_slide() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_slides(dir.path(), 2);
    let output = dir.path().join("deck.pptx");
    let converter = Converter::new(TextDetector::new(Arc::new(Flaky(AtomicUsize::new(0)))));

    let result = converter.convert_images(&images, &output, &mut |_: &ProgressEvent| {}).await;

    assert!(result.success);
    assert_eq!(result.slides_count, 2);
    assert_eq!(result.text_blocks_count, 1);
    let second = slide_xml(&output, 2);
    assert_eq!(second.matches("<p:pic>").count(), 1);
    assert_eq!(second.matches("<p:sp>").count(), 0);
    assert!(!dir.path().join("002_page_002.processed.png").exists());
}

#[tokio::test]
async fn noise_filter_and_reference_correction_apply_per_slide() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_slides(dir.path(), 1);
    let output = dir.path().join("deck.pptx");
    let converter = Converter::new(TextDetector::new(Arc::new(TwoRuns)))
        .with_noise_filter(NoiseFilter::new(Arc::new(KeepFirst)))
        .with_reference_text("##第1页\n人工智能的未来展望\n", 0.6)
        .with_options(ConvertOptions {
            remove_text: false,
            ..ConvertOptions::default()
        });

    let mut stages = Vec::new();
    let result = converter
        .convert_images(&images, &output, &mut |event: &ProgressEvent| {
            stages.push(event.stage())
        })
        .await;

    assert!(result.success);
    assert_eq!(result.text_blocks_count, 1);
    assert!(stages.contains(&"llm_filter"));
    let xml = slide_xml(&output, 1);
    assert!(xml.contains("<a:t>人工智能的未来展望</a:t>"));
    assert!(!xml.contains("重新思考学习的本质"));
    assert!(!dir.path().join("001_page_001.processed.png").exists());
}

#[tokio::test]
async fn unreadable_images_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = write_slides(dir.path(), 1);
    images.insert(0, dir.path().join("missing.png"));
    let output = dir.path().join("deck.pptx");
    let converter = Converter::new(TextDetector::new(Arc::new(TwoRuns)));

    let result = converter.convert_images(&images, &output, &mut |_: &ProgressEvent| {}).await;

    assert!(result.success);
    assert_eq!(result.slides_count, 1);

    let nothing = converter
        .convert_images(&[dir.path().join("missing.png")], &output, &mut |_: &ProgressEvent| {})
        .await;
    assert!(!nothing.success);
}

#[tokio::test]
async fn same_stem_in_different_directories_keeps_each_background() {
    let dir = tempfile::tempdir().unwrap();
    let images = vec![
        write_solid(&dir.path().join("a").join("page.png"), [255, 0, 0]),
        write_solid(&dir.path().join("b").join("page.png"), [0, 0, 255]),
    ];
    let work_dir = dir.path().join("work");
    let converter = Converter::new(TextDetector::new(Arc::new(TwoRuns))).with_options(ConvertOptions {
        work_dir: Some(work_dir.clone()),
        ..ConvertOptions::default()
    });

    let first = dir.path().join("first.pptx");
    let second = dir.path().join("second.pptx");
    assert!(converter.convert_images(&images, &first, &mut |_: &ProgressEvent| {}).await.success);
    assert!(converter.convert_images(&images, &second, &mut |_: &ProgressEvent| {}).await.success);

    for output in [&first, &second] {
        assert_dominant(slide_corner(output, 1), 0);
        assert_dominant(slide_corner(output, 2), 2);
    }
    let runs = std::fs::read_dir(&work_dir).unwrap().count();
    assert_eq!(runs, 2);
}

#[tokio::test]
async fn png_and_jpg_siblings_keep_each_background() {
    let dir = tempfile::tempdir().unwrap();
    let images = vec![
        write_solid(&dir.path().join("slide.png"), [255, 0, 0]),
        write_solid(&dir.path().join("slide.jpg"), [0, 0, 255]),
    ];
    let output = dir.path().join("deck.pptx");
    let converter = Converter::new(TextDetector::new(Arc::new(TwoRuns)));

    let result = converter.convert_images(&images, &output, &mut |_: &ProgressEvent| {}).await;

    assert!(result.success);
    assert_dominant(slide_corner(&output, 1), 0);
    assert_dominant(slide_corner(&output, 2), 2);
    assert!(dir.path().join("001_slide.processed.png").exists());
    assert!(dir.path().join("002_slide.processed.png").exists());
}
