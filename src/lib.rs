pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod classifier;
pub mod config;
pub mod error;
pub mod narrative;
pub mod pipeline;
pub mod preprocess;
pub mod saliency;
pub mod store;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use math::tensor::{Shape, Tensor};
pub use activation::activation::ActivationFunction;
pub use layers::Layer;
pub use network::network::Network;
pub use network::tape::{Differentiable, GradientTape};
pub use classifier::{ClassifierKind, Prediction, TumorClass, TumorClassifier};
pub use config::{LensConfig, SaliencyConfig};
pub use error::{LensError, Result};
pub use narrative::{GeminiClient, NarrativeError, NarrativeService};
pub use pipeline::{Analysis, Consultation, Pipeline};
pub use preprocess::Upload;
pub use saliency::{Overlay, SaliencyEngine};
pub use store::{OverlayStore, StoredOverlay};
