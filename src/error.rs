use thiserror::Error;

/// Errors raised by the classification and saliency pipeline.
///
/// Narrative (LLM) failures live in `narrative::NarrativeError` and never
/// abort an analysis.
#[derive(Debug, Error)]
pub enum LensError {
    /// The uploaded bytes are not a decodable image.
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Encoding or resizing failed after a successful decode.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A tensor did not have the shape a layer or model expects.
    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("class index {index} out of range for {classes} classes")]
    ClassIndex { index: usize, classes: usize },

    /// Weights loaded fine but do not fit the selected classifier backend.
    #[error("model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LensError>;
