pub mod kind;
pub mod label;
pub mod tumor_classifier;

pub use kind::ClassifierKind;
pub use label::TumorClass;
pub use tumor_classifier::{Prediction, TumorClassifier};
