mod baidu;
mod detector;
mod prepare;

use std::future::Future;
use std::pin::Pin;

use crate::error::StageError;

pub use baidu::{BaiduCredentials, BaiduOcr};
pub use detector::TextDetector;
pub use prepare::{OcrLimits, PreparedImage, prepare_image};

/// A text run as returned by an OCR provider, in the coordinate space of the
/// image that was actually sent (see [`PreparedImage::scale`]).
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextRun {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f32,
}

pub type OcrFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<RawTextRun>, StageError>> + Send + 'a>>;

pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    fn recognize<'a>(&'a self, image: &'a PreparedImage) -> OcrFuture<'a>;
}
