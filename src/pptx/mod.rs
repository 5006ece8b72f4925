mod layout;
mod parts;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::model::SlideData;

pub use layout::{
    EMU_PER_PT, SLIDE_HEIGHT_EMU, SLIDE_WIDTH_EMU, TextBoxPlacement, estimate_text_width,
    fit_font_size, place_fragment,
};

const PASSTHROUGH_MEDIA: [&str; 4] = ["png", "jpg", "gif", "bmp"];

#[derive(Debug, Clone)]
struct Media {
    bytes: Vec<u8>,
    extension: &'static str,
    mime: &'static str,
}

impl Media {
    /// Keeps formats presentation apps embed directly; anything else becomes PNG.
    fn from_bytes(bytes: Vec<u8>) -> Result<Media> {
        if let Some(kind) = infer::get(&bytes)
            && PASSTHROUGH_MEDIA.contains(&kind.extension())
        {
            return Ok(Media {
                bytes,
                extension: kind.extension(),
                mime: kind.mime_type(),
            });
        }
        let decoded =
            image::load_from_memory(&bytes).with_context(|| "unsupported background image")?;
        Media::png(&decoded)
    }

    fn from_image(image: &RgbImage) -> Result<Media> {
        Media::png(&DynamicImage::ImageRgb8(image.clone()))
    }

    fn png(image: &DynamicImage) -> Result<Media> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .with_context(|| "failed to encode background as png")?;
        Ok(Media {
            bytes: png.into_inner(),
            extension: "png",
            mime: "image/png",
        })
    }
}

#[derive(Debug, Clone)]
struct SlidePart {
    xml: Vec<u8>,
    media: Media,
}

/// Accumulates slides in memory and writes a `.pptx` package once.
#[derive(Debug, Clone, Default)]
pub struct DeckWriter {
    slides: Vec<SlidePart>,
    title: String,
}

impl DeckWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Adds one slide: the background bitmap covering the canvas, then one
    /// single-line text box per fragment.
    pub fn add_slide(&mut self, slide: &SlideData) -> Result<()> {
        let bytes = std::fs::read(&slide.image_path).with_context(|| {
            format!("failed to read slide background: {}", slide.image_path.display())
        })?;
        self.push_slide(slide, Media::from_bytes(bytes)?)
    }

    /// Like [`DeckWriter::add_slide`], but embeds `background` instead of
    /// reading `slide.image_path`.
    pub fn add_slide_with_background(&mut self, slide: &SlideData, background: &RgbImage) -> Result<()> {
        self.push_slide(slide, Media::from_image(background)?)
    }

    fn push_slide(&mut self, slide: &SlideData, media: Media) -> Result<()> {
        let texts: Vec<_> = slide
            .fragments
            .iter()
            .map(|fragment| (fragment, place_fragment(fragment, slide.width, slide.height)))
            .collect();
        for (fragment, placement) in &texts {
            if placement.font_size_pt != fragment.style().size_pt {
                debug!(
                    "shrunk '{}' from {}pt to {}pt",
                    fragment.text(),
                    fragment.style().size_pt,
                    placement.font_size_pt
                );
            }
        }
        let xml = parts::slide(&texts)?;
        self.slides.push(SlidePart { xml, media });
        Ok(())
    }

    /// Serializes the package without touching the filesystem.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let count = self.slides.len();

        let mut media_types = BTreeMap::new();
        for slide in &self.slides {
            media_types.insert(slide.media.extension, slide.media.mime);
        }
        let media_types: Vec<(&str, &str)> = media_types.into_iter().collect();

        let mut entries: Vec<(String, Vec<u8>)> = vec![
            (
                "[Content_Types].xml".to_string(),
                parts::content_types(count, &media_types)?,
            ),
            ("_rels/.rels".to_string(), parts::root_relationships()?),
            ("docProps/core.xml".to_string(), parts::core_properties(&self.title)?),
            ("docProps/app.xml".to_string(), parts::app_properties(count)?),
            ("ppt/presentation.xml".to_string(), parts::presentation(count)?),
            (
                "ppt/_rels/presentation.xml.rels".to_string(),
                parts::presentation_relationships(count)?,
            ),
            (
                "ppt/slideMasters/slideMaster1.xml".to_string(),
                parts::SLIDE_MASTER.as_bytes().to_vec(),
            ),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                parts::master_relationships()?,
            ),
            (
                "ppt/slideLayouts/slideLayout1.xml".to_string(),
                parts::SLIDE_LAYOUT.as_bytes().to_vec(),
            ),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                parts::layout_relationships()?,
            ),
            ("ppt/theme/theme1.xml".to_string(), parts::THEME.as_bytes().to_vec()),
            ("ppt/presProps.xml".to_string(), parts::PRES_PROPS.as_bytes().to_vec()),
            ("ppt/viewProps.xml".to_string(), parts::VIEW_PROPS.as_bytes().to_vec()),
            ("ppt/tableStyles.xml".to_string(), parts::TABLE_STYLES.as_bytes().to_vec()),
        ];
        for (idx, slide) in self.slides.iter().enumerate() {
            let number = idx + 1;
            let media_name = format!("image{}.{}", number, slide.media.extension);
            entries.push((format!("ppt/slides/slide{}.xml", number), slide.xml.clone()));
            entries.push((
                format!("ppt/slides/_rels/slide{}.xml.rels", number),
                parts::slide_relationships(&media_name)?,
            ));
            entries.push((format!("ppt/media/{}", media_name), slide.media.bytes.clone()));
        }

        for (name, data) in entries {
            writer
                .start_file(name, options)
                .with_context(|| "failed to write zip entry")?;
            writer
                .write_all(&data)
                .with_context(|| "failed to write zip content")?;
        }
        let bytes = writer
            .finish()
            .with_context(|| "failed to finalize zip output")?
            .into_inner();
        Ok(bytes)
    }

    /// Writes the package to `output`. The file only appears once complete.
    pub fn save(&self, output: &Path) -> Result<PathBuf> {
        let bytes = self.to_bytes()?;
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
        let mut file = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        file.write_all(&bytes)
            .with_context(|| "failed to write presentation")?;
        file.persist(output)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write presentation: {}", output.display()))?;
        info!("saved {} slides to {}", self.slides.len(), output.display());
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBoxPx, TextFragment};
    use image::Rgb;
    use std::io::Read;
    use zip::ZipArchive;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn writes_a_complete_package() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("page.png");
        write_png(&image_path, 192, 108);
        let mut deck = DeckWriter::new().with_title("lecture");
        deck.add_slide(&SlideData {
            index: 1,
            image_path: image_path.clone(),
            width: 192,
            height: 108,
            fragments: vec![TextFragment::new("标题", BBoxPx::new(10, 10, 50, 12), 0.9)],
        })
        .unwrap();
        let output = dir.path().join("out").join("deck.pptx");
        assert_eq!(deck.save(&output).unwrap(), output);

        let mut archive = ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/media/image1.png",
            "ppt/theme/theme1.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }
        let mut slide = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .unwrap()
            .read_to_string(&mut slide)
            .unwrap();
        assert!(slide.contains("<a:t>标题</a:t>"));
    }

    #[test]
    fn in_memory_background_is_embedded_as_png() {
        let mut deck = DeckWriter::new();
        let background = RgbImage::from_pixel(16, 9, Rgb([200, 10, 10]));
        deck.add_slide_with_background(
            &SlideData {
                index: 1,
                image_path: PathBuf::from("/nonexistent/page.jpg"),
                width: 16,
                height: 9,
                fragments: Vec::new(),
            },
            &background,
        )
        .unwrap();
        let mut archive = ZipArchive::new(Cursor::new(deck.to_bytes().unwrap())).unwrap();
        let mut bytes = Vec::new();
        archive
            .by_name("ppt/media/image1.png")
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        let embedded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(embedded, background);
    }

    #[test]
    fn missing_background_is_an_error() {
        let mut deck = DeckWriter::new();
        let result = deck.add_slide(&SlideData {
            index: 1,
            image_path: PathBuf::from("/nonexistent/page.png"),
            width: 10,
            height: 10,
            fragments: Vec::new(),
        });
        assert!(result.is_err());
        assert_eq!(deck.slide_count(), 0);
    }

    #[test]
    fn failed_save_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let output = blocker.join("deck.pptx");
        assert!(DeckWriter::new().save(&output).is_err());
        assert!(!output.exists());
    }
}
