use ndarray::{concatenate, Array4, Axis};
use tracing::info;

use crate::consts::{
    COLOR_CHANNEL_COUNT, FLOW_CHANNEL_COUNT, FLOW_INPUT_MEAN, FLOW_INPUT_STD, PYRAMID_LEVEL_COUNT,
};
use crate::error::{FlowStackError, Result};
use crate::flow::pyramid::{build_pyramid, upsample_flow};
use crate::flow::refiner::FlowRefiner;
use crate::warp::{BackwardWarp, FlowResampler};
use crate::weights::WeightStore;

/// Reorder channels and apply the fixed per-channel normalization expected
/// by the flow refiners.
///
/// Input channels are (blue, green, red); the output is (red, green, blue)
/// with each channel centered and scaled by the constants in
/// [`crate::consts`].
pub fn normalize_frames(frames: &Array4<f32>) -> Array4<f32> {
    let (batch, channels, h, w) = frames.dim();
    debug_assert_eq!(channels, COLOR_CHANNEL_COUNT);

    let mut output = Array4::<f32>::zeros((batch, channels, h, w));
    for b in 0..batch {
        for c in 0..COLOR_CHANNEL_COUNT {
            let src = COLOR_CHANNEL_COUNT - 1 - c;
            let mean = FLOW_INPUT_MEAN[src];
            let std = FLOW_INPUT_STD[src];
            for y in 0..h {
                for x in 0..w {
                    output[[b, c, y, x]] = (frames[[b, src, y, x]] - mean) / std;
                }
            }
        }
    }
    output
}

/// Coarse-to-fine optical flow estimator.
///
/// Holds one [`FlowRefiner`] per pyramid level plus a [`BackwardWarp`]
/// used to align the second frame before each refinement. Estimation is a
/// strictly sequential walk from the coarsest level to the finest: each
/// level's flow seeds the next through 2x upsampling with magnitude
/// doubling.
pub struct FlowEstimator {
    refiners: Vec<FlowRefiner>,
    warp: BackwardWarp,
}

impl FlowEstimator {
    /// Load all refiner levels from the store. A missing entry for any
    /// level aborts construction; there is no partially-loaded estimator.
    pub fn from_store(store: &dyn WeightStore) -> Result<Self> {
        let mut refiners = Vec::with_capacity(PYRAMID_LEVEL_COUNT);
        for level in 0..PYRAMID_LEVEL_COUNT {
            refiners.push(FlowRefiner::from_store(store, level)?);
        }
        Ok(Self {
            refiners,
            warp: BackwardWarp::new(),
        })
    }

    /// Estimate the dense flow carrying `first` onto `second`.
    ///
    /// Both inputs are `(batch, 3, height, width)`; the result is
    /// `(batch, 2, height, width)` in pixel units at full resolution.
    pub fn estimate(&mut self, first: &Array4<f32>, second: &Array4<f32>) -> Result<Array4<f32>> {
        if first.dim() != second.dim() {
            let (b, c, h, w) = second.dim();
            let (eb, ec, eh, ew) = first.dim();
            return Err(FlowStackError::ShapeMismatch {
                context: "flow input pair",
                expected: vec![eb, ec, eh, ew],
                got: vec![b, c, h, w],
            });
        }

        let (_, channels, height, width) = first.dim();
        if channels != COLOR_CHANNEL_COUNT {
            return Err(FlowStackError::ShapeMismatch {
                context: "flow input channels",
                expected: vec![COLOR_CHANNEL_COUNT],
                got: vec![channels],
            });
        }
        if height < 2 || width < 2 {
            return Err(FlowStackError::InvalidDimensions { width, height });
        }

        let first_pyramid = build_pyramid(&normalize_frames(first));
        let second_pyramid = build_pyramid(&normalize_frames(second));
        debug_assert!(first_pyramid.len() <= self.refiners.len());

        let (batch, _, coarse_h, coarse_w) = first_pyramid[0].dim();
        info!(levels = first_pyramid.len(), "estimating optical flow");

        // Zero flow at half the coarsest resolution; the first loop pass
        // upsamples it to the coarsest level itself.
        let mut flow =
            Array4::<f32>::zeros((batch, FLOW_CHANNEL_COUNT, coarse_h / 2, coarse_w / 2));

        for (level, (ref_level, target_level)) in
            first_pyramid.iter().zip(&second_pyramid).enumerate()
        {
            let (_, _, level_h, level_w) = ref_level.dim();
            let upsampled = upsample_flow(&flow, level_h, level_w)?;
            let warped = self.warp.warp(target_level, &upsampled)?;

            let input = concatenate(
                Axis(1),
                &[ref_level.view(), warped.view(), upsampled.view()],
            )
            .map_err(|e| FlowStackError::Pipeline(format!("refiner input assembly: {e}")))?;

            let residual = self.refiners[level].forward(&input)?;
            flow = residual + &upsampled;
        }

        Ok(flow)
    }
}
