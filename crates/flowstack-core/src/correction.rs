//! Learned affine spatial correction.
//!
//! A small localization network regresses a 2x3 affine transform from the
//! incoming frame; the transform is applied through an affine sampling
//! grid to re-align the frame before the final warp. A parallel path for
//! correcting the flow field exists behind a configuration flag and shares
//! the affine regressor head.

use ndarray::{Array2, Array3, Array4};

use crate::consts::{COLOR_CHANNEL_COUNT, FLOW_CHANNEL_COUNT};
use crate::error::{FlowStackError, Result};
use crate::ops::{affine_grid, grid_sample_border, max_pool2d, relu, Conv2d, Linear};
use crate::weights::{WeightGroup, WeightStore};

const LOC_MID_CHANNELS: usize = 8;
const LOC_OUT_CHANNELS: usize = 10;
const LOC_KERNEL_FIRST: usize = 7;
const LOC_KERNEL_SECOND: usize = 5;
const AFFINE_HIDDEN: usize = 32;
const AFFINE_PARAMS: usize = 6;

/// Smallest input extent the two unpadded localization convolutions plus
/// poolings can reduce without collapsing to zero features.
const MIN_LOC_EXTENT: usize = 18;

/// Two-stage localization feature extractor: conv (kernel 7, no padding),
/// 2x2 max pool, ReLU, conv (kernel 5, no padding), 2x2 max pool, ReLU.
#[derive(Clone, Debug)]
pub struct LocalizationNet {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl LocalizationNet {
    pub fn from_store(
        store: &dyn WeightStore,
        group: WeightGroup,
        in_channels: usize,
    ) -> Result<Self> {
        let conv1 = Conv2d::from_store(
            store,
            group,
            0,
            0,
            LOC_MID_CHANNELS,
            in_channels,
            LOC_KERNEL_FIRST,
            0,
        )?;
        let conv2 = Conv2d::from_store(
            store,
            group,
            0,
            1,
            LOC_OUT_CHANNELS,
            LOC_MID_CHANNELS,
            LOC_KERNEL_SECOND,
            0,
        )?;
        Ok(Self { conv1, conv2 })
    }

    pub fn forward(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut features = max_pool2d(&self.conv1.forward(input)?);
        relu(&mut features);
        let mut features = max_pool2d(&self.conv2.forward(&features)?);
        relu(&mut features);
        Ok(features)
    }

    /// Spatial extent of the feature map produced for an input extent.
    /// Saturates to zero below the minimum workable input size.
    pub fn feature_extent(extent: usize) -> usize {
        (extent.saturating_sub(LOC_KERNEL_FIRST - 1) / 2).saturating_sub(LOC_KERNEL_SECOND - 1) / 2
    }
}

/// Fully-connected affine regressor: flat features -> 32 -> 6, reshaped to
/// a `(batch, 2, 3)` transform.
#[derive(Clone, Debug)]
pub struct AffineHead {
    fc1: Linear,
    fc2: Linear,
}

impl AffineHead {
    pub fn from_store(store: &dyn WeightStore, flat_features: usize) -> Result<Self> {
        let fc1 = Linear::from_store(
            store,
            WeightGroup::AffineHead,
            0,
            AFFINE_HIDDEN,
            flat_features,
        )?;
        let fc2 = Linear::from_store(store, WeightGroup::AffineHead, 1, AFFINE_PARAMS, AFFINE_HIDDEN)?;
        Ok(Self { fc1, fc2 })
    }

    /// The identity initialization: zero weights throughout and the final
    /// bias set to the identity transform (unit scale, no translation).
    pub fn identity(flat_features: usize) -> Result<Self> {
        let fc1 = Linear::new(
            Array2::zeros((AFFINE_HIDDEN, flat_features)),
            ndarray::Array1::zeros(AFFINE_HIDDEN),
        )?;
        let fc2 = Linear::new(
            Array2::zeros((AFFINE_PARAMS, AFFINE_HIDDEN)),
            ndarray::arr1(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        )?;
        Ok(Self { fc1, fc2 })
    }

    pub fn forward(&self, features: &Array2<f32>) -> Result<Array3<f32>> {
        let mut hidden = self.fc1.forward(features)?;
        relu(&mut hidden);
        let params = self.fc2.forward(&hidden)?;

        let batch = params.dim().0;
        let mut theta = Array3::<f32>::zeros((batch, 2, 3));
        for b in 0..batch {
            for r in 0..2 {
                for c in 0..3 {
                    theta[[b, r, c]] = params[[b, r * 3 + c]];
                }
            }
        }
        Ok(theta)
    }
}

/// Learned spatial correction stage.
pub struct CorrectionNet {
    frame_loc: LocalizationNet,
    flow_loc: Option<LocalizationNet>,
    head: AffineHead,
    height: usize,
    width: usize,
}

impl CorrectionNet {
    /// Load the correction stage for a fixed frame extent. The flow path
    /// is only constructed (and its weights only required) when
    /// `enable_flow_correction` is set.
    pub fn from_store(
        store: &dyn WeightStore,
        height: usize,
        width: usize,
        enable_flow_correction: bool,
    ) -> Result<Self> {
        if height < MIN_LOC_EXTENT || width < MIN_LOC_EXTENT {
            return Err(FlowStackError::InvalidDimensions { width, height });
        }
        let head = AffineHead::from_store(store, Self::flat_features(height, width))?;
        Self::build(store, height, width, enable_flow_correction, head)
    }

    /// Like [`CorrectionNet::from_store`], but with the affine head left
    /// at its identity initialization instead of loading trained
    /// parameters — the correction stage then resamples every input
    /// through the identity transform.
    pub fn from_store_with_identity_head(
        store: &dyn WeightStore,
        height: usize,
        width: usize,
        enable_flow_correction: bool,
    ) -> Result<Self> {
        if height < MIN_LOC_EXTENT || width < MIN_LOC_EXTENT {
            return Err(FlowStackError::InvalidDimensions { width, height });
        }
        let head = AffineHead::identity(Self::flat_features(height, width))?;
        Self::build(store, height, width, enable_flow_correction, head)
    }

    fn flat_features(height: usize, width: usize) -> usize {
        LOC_OUT_CHANNELS
            * LocalizationNet::feature_extent(height)
            * LocalizationNet::feature_extent(width)
    }

    fn build(
        store: &dyn WeightStore,
        height: usize,
        width: usize,
        enable_flow_correction: bool,
        head: AffineHead,
    ) -> Result<Self> {
        let frame_loc =
            LocalizationNet::from_store(store, WeightGroup::FrameLocalization, COLOR_CHANNEL_COUNT)?;
        let flow_loc = if enable_flow_correction {
            Some(LocalizationNet::from_store(
                store,
                WeightGroup::FlowLocalization,
                FLOW_CHANNEL_COUNT,
            )?)
        } else {
            None
        };

        Ok(Self {
            frame_loc,
            flow_loc,
            head,
            height,
            width,
        })
    }

    pub fn flow_correction_enabled(&self) -> bool {
        self.flow_loc.is_some()
    }

    /// Re-align a frame (and, when enabled, its flow field) by the
    /// regressed affine transform. The flow passes through untouched when
    /// the flow path is off.
    pub fn correct(
        &self,
        frame: &Array4<f32>,
        flow: &Array4<f32>,
    ) -> Result<(Array4<f32>, Array4<f32>)> {
        let (batch, _, h, w) = frame.dim();
        if h != self.height || w != self.width {
            return Err(FlowStackError::ShapeMismatch {
                context: "correction frame extent",
                expected: vec![self.height, self.width],
                got: vec![h, w],
            });
        }
        let (fb, fc, fh, fw) = flow.dim();
        if fb != batch || fc != FLOW_CHANNEL_COUNT || fh != h || fw != w {
            return Err(FlowStackError::ShapeMismatch {
                context: "correction flow field",
                expected: vec![batch, FLOW_CHANNEL_COUNT, h, w],
                got: vec![fb, fc, fh, fw],
            });
        }

        let theta = self.regress(&self.frame_loc, frame)?;
        let grid = affine_grid(&theta, self.height, self.width)?;
        let corrected_frame = grid_sample_border(frame, &grid)?;

        let corrected_flow = match &self.flow_loc {
            Some(flow_loc) => {
                let theta = self.regress(flow_loc, flow)?;
                let grid = affine_grid(&theta, self.height, self.width)?;
                grid_sample_border(flow, &grid)?
            }
            None => flow.clone(),
        };

        Ok((corrected_frame, corrected_flow))
    }

    fn regress(&self, loc: &LocalizationNet, input: &Array4<f32>) -> Result<Array3<f32>> {
        let features = loc.forward(input)?;
        self.head.forward(&flatten(&features))
    }
}

/// Flatten `(batch, c, h, w)` features to `(batch, c*h*w)` in channel-major
/// order.
fn flatten(features: &Array4<f32>) -> Array2<f32> {
    let (batch, channels, h, w) = features.dim();
    let mut flat = Array2::<f32>::zeros((batch, channels * h * w));
    for b in 0..batch {
        let mut i = 0;
        for c in 0..channels {
            for y in 0..h {
                for x in 0..w {
                    flat[[b, i]] = features[[b, c, y, x]];
                    i += 1;
                }
            }
        }
    }
    flat
}
