//! Numeric kernels shared by the model stages: convolution, pooling,
//! interpolation, padding, and grid resampling.

pub mod conv;
pub mod interp;
pub mod pad;
pub mod pool;
pub mod sample;

pub use conv::{relu, Conv2d, Linear};
pub use interp::upsample_bilinear_2x;
pub use pad::replicate_pad;
pub use pool::{avg_pool2d, max_pool2d};
pub use sample::{affine_grid, grid_sample_border};
