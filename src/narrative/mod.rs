pub mod gemini;
pub mod prompt;

use image::RgbImage;
use thiserror::Error;

pub use gemini::GeminiClient;

/// Failures of the narrative step. None of these abort an analysis; the
/// pipeline reports them next to the classification result.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("no API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("narrative service is not configured")]
    Unavailable,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("service returned no text")]
    EmptyResponse,

    #[error("could not encode image for upload: {0}")]
    Encode(#[from] image::ImageError),
}

/// A multimodal text generator: one prompt plus one image in, free text out.
pub trait NarrativeService {
    fn generate(&self, prompt: &str, image: &RgbImage) -> Result<String, NarrativeError>;
}

impl<T: NarrativeService + ?Sized> NarrativeService for Box<T> {
    fn generate(&self, prompt: &str, image: &RgbImage) -> Result<String, NarrativeError> {
        (**self).generate(prompt, image)
    }
}
