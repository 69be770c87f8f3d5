pub mod metadata;
pub mod network;
pub mod spec;
pub mod tape;

pub use metadata::{InputType, ModelMetadata};
pub use network::Network;
pub use spec::{NetworkSpec, LayerSpec};
pub use tape::{Differentiable, GradientTape};
