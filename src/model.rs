use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBoxPx {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    /// Clips the box so it lies inside a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> BBoxPx {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        BBoxPx {
            x,
            y,
            w: right.saturating_sub(x),
            h: bottom.saturating_sub(y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontCategory {
    Sans,
    Serif,
    Script,
    Rounded,
    Other,
}

impl FontCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontCategory::Sans => "sans",
            FontCategory::Serif => "serif",
            FontCategory::Script => "script",
            FontCategory::Rounded => "rounded",
            FontCategory::Other => "other",
        }
    }

    /// Free font family the category renders with.
    pub fn family(&self) -> &'static str {
        match self {
            FontCategory::Sans | FontCategory::Rounded | FontCategory::Other => "Noto Sans SC",
            FontCategory::Serif => "Noto Serif SC",
            FontCategory::Script => "LXGW WenKai",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Light,
    Regular,
    Medium,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

pub const MIN_FONT_PT: u32 = 8;
pub const MAX_FONT_PT: u32 = 144;
pub const HEADLINE_MIN_PT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStyle {
    pub category: FontCategory,
    pub weight: FontWeight,
    pub size_pt: u32,
    pub color: Rgb,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            category: FontCategory::Sans,
            weight: FontWeight::Regular,
            size_pt: 12,
            color: Rgb::BLACK,
        }
    }
}

impl TextStyle {
    pub fn is_headline(&self) -> bool {
        self.size_pt >= HEADLINE_MIN_PT
    }

    pub fn is_bold(&self) -> bool {
        self.is_headline() || self.weight == FontWeight::Bold
    }
}

/// One recognized run of text. Stages produce new values instead of mutating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFragment {
    text: String,
    bbox: BBoxPx,
    confidence: f32,
    style: TextStyle,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: BBoxPx, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            style: TextStyle::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bbox(&self) -> BBoxPx {
        self.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self
        }
    }

    pub fn with_style(self, style: TextStyle) -> Self {
        Self { style, ..self }
    }
}

#[derive(Debug, Clone)]
pub struct SlideData {
    pub index: usize,
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fragments: Vec<TextFragment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub slides_count: usize,
    pub text_blocks_count: usize,
    pub error_message: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(output_path: PathBuf, slides_count: usize, text_blocks_count: usize) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            slides_count,
            text_blocks_count,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            slides_count: 0,
            text_blocks_count: 0,
            error_message: Some(message.into()),
        }
    }
}
