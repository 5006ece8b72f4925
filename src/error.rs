use thiserror::Error;

/// Failure of a single pipeline stage for one slide.
///
/// Optional stages (noise filtering, reference correction) degrade to identity on
/// these; detection turns them into an empty fragment list for the slide.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("ocr request failed: {0}")]
    Ocr(String),

    #[error("ocr provider error {code}: {message}")]
    OcrProvider { code: i64, message: String },

    #[error("reasoning request failed: {0}")]
    Reasoning(String),

    #[error("unparseable response: {0:?}")]
    Unparseable(String),

    #[error("image processing failed: {0}")]
    Image(String),
}

impl StageError {
    pub(crate) fn ocr(err: impl std::fmt::Display) -> Self {
        StageError::Ocr(err.to_string())
    }

    pub(crate) fn reasoning(err: impl std::fmt::Display) -> Self {
        StageError::Reasoning(err.to_string())
    }

    pub(crate) fn image(err: impl std::fmt::Display) -> Self {
        StageError::Image(err.to_string())
    }
}

/// Deck-level failures. Everything else is absorbed per slide.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write presentation: {0}")]
    Emit(#[from] anyhow::Error),
}

/// Runs an optional stage and falls back to `identity` when it fails.
pub(crate) fn degrade_to_identity<T>(
    stage: &str,
    page: usize,
    result: Result<T, StageError>,
    identity: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("page {}: {} failed, keeping input unchanged: {}", page, stage, err);
            identity()
        }
    }
}
