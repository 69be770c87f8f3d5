pub mod colormap;
pub mod engine;
pub mod ops;

pub use engine::{Overlay, SaliencyEngine};
