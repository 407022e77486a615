//! Temporal fusion of the warped frame stack.

use ndarray::{Array4, Array5};

use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{FlowStackError, Result};
use crate::ops::{relu, Conv2d};
use crate::weights::{WeightGroup, WeightStore};

const FUSION_MID_CHANNELS: usize = 64;
const FUSION_KERNEL_FIRST: usize = 9;

/// Fuses a warped multi-frame stack into a single output frame.
///
/// Averages the stack over the temporal axis, then applies a three-layer
/// convolution block (3 -> 64 -> 64 -> 3, kernels 9/1/1) with ReLU after
/// every layer, the last included.
pub struct FusionNet {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
}

impl FusionNet {
    pub fn from_store(store: &dyn WeightStore) -> Result<Self> {
        let conv1 = Conv2d::from_store(
            store,
            WeightGroup::Fusion,
            0,
            0,
            FUSION_MID_CHANNELS,
            COLOR_CHANNEL_COUNT,
            FUSION_KERNEL_FIRST,
            FUSION_KERNEL_FIRST / 2,
        )?;
        let conv2 = Conv2d::from_store(
            store,
            WeightGroup::Fusion,
            0,
            1,
            FUSION_MID_CHANNELS,
            FUSION_MID_CHANNELS,
            1,
            0,
        )?;
        let conv3 = Conv2d::from_store(
            store,
            WeightGroup::Fusion,
            0,
            2,
            COLOR_CHANNEL_COUNT,
            FUSION_MID_CHANNELS,
            1,
            0,
        )?;
        Ok(Self {
            conv1,
            conv2,
            conv3,
        })
    }

    /// Fuse a `(batch, frames, channels, h, w)` stack into
    /// `(batch, channels, h, w)`.
    pub fn fuse(&self, frames: &Array5<f32>) -> Result<Array4<f32>> {
        let (batch, count, channels, h, w) = frames.dim();
        if count == 0 {
            return Err(FlowStackError::Pipeline("empty frame stack".into()));
        }

        let mut mean = Array4::<f32>::zeros((batch, channels, h, w));
        for b in 0..batch {
            for f in 0..count {
                for c in 0..channels {
                    for y in 0..h {
                        for x in 0..w {
                            mean[[b, c, y, x]] += frames[[b, f, c, y, x]];
                        }
                    }
                }
            }
        }
        mean.mapv_inplace(|v| v / count as f32);

        let mut out = self.conv1.forward(&mean)?;
        relu(&mut out);
        let mut out = self.conv2.forward(&out)?;
        relu(&mut out);
        let mut out = self.conv3.forward(&out)?;
        relu(&mut out);
        Ok(out)
    }
}
