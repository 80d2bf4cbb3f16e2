pub mod activation;
pub mod checkpoint;
pub mod error;
pub mod hyperparams;
pub mod labels;
pub mod model;
pub mod utils;

pub use activation::Activation;
pub use error::{Error, Result};
pub use hyperparams::{Architecture, HyperParams};
pub use model::SegmentationNet;
