//! Coarse-to-fine learned optical flow estimation.

pub mod estimator;
pub mod pyramid;
pub mod refiner;

pub use estimator::{normalize_frames, FlowEstimator};
pub use pyramid::{build_pyramid, upsample_flow};
pub use refiner::FlowRefiner;
