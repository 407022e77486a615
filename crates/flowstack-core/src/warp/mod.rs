//! Flow-driven resampling strategies.
//!
//! Two numerically distinct formulations of "resample an image by a flow
//! field" coexist in the pipeline: [`BackwardWarp`] rescales flow into
//! normalized-coordinate offsets and is used inside the pyramid loop,
//! while [`IndexWarp`] adds flow to raw pixel indices before normalizing
//! and is used only for the final fusion step. Call sites pick one
//! explicitly through the shared [`FlowResampler`] trait.

pub mod backward;
pub mod index;

use ndarray::Array4;

use crate::error::Result;

pub use backward::BackwardWarp;
pub use index::IndexWarp;

/// Resample an image by a dense flow field.
///
/// Takes `&mut self` because implementations may keep derived sampling
/// state (see [`BackwardWarp`]'s grid cache); sharing one instance across
/// threads is therefore ruled out at compile time — use per-thread
/// instances for concurrent warping.
pub trait FlowResampler {
    /// Warp `image` `(batch, channels, h, w)` by `flow` `(batch, 2, h, w)`.
    fn warp(&mut self, image: &Array4<f32>, flow: &Array4<f32>) -> Result<Array4<f32>>;
}

/// Shared shape validation for both strategies.
pub(crate) fn check_warp_shapes(image: &Array4<f32>, flow: &Array4<f32>) -> Result<()> {
    use crate::error::FlowStackError;

    let (ib, _, ih, iw) = image.dim();
    let (fb, fc, fh, fw) = flow.dim();
    if fb != ib || fc != 2 || fh != ih || fw != iw {
        return Err(FlowStackError::ShapeMismatch {
            context: "warp flow field",
            expected: vec![ib, 2, ih, iw],
            got: vec![fb, fc, fh, fw],
        });
    }
    if ih < 2 || iw < 2 {
        return Err(FlowStackError::InvalidDimensions {
            width: iw,
            height: ih,
        });
    }
    Ok(())
}
