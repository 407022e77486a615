use ndarray::Array4;

use crate::consts::{REFINER_CHANNELS, REFINER_KERNEL, REFINER_PADDING};
use crate::error::Result;
use crate::ops::{relu, Conv2d};
use crate::weights::{WeightGroup, WeightStore};

/// Dense flow refiner for one pyramid level.
///
/// A fixed five-layer convolution stack (8 -> 32 -> 64 -> 32 -> 16 -> 2,
/// kernel 7, stride 1, same padding) that maps a concatenated
/// [reference frame, warped target, coarse flow] tensor to a flow
/// residual. ReLU follows each layer except the last.
#[derive(Clone, Debug)]
pub struct FlowRefiner {
    layers: Vec<Conv2d>,
}

impl FlowRefiner {
    /// Load every layer of the refiner for `level` from the store.
    /// Missing or mis-shaped entries abort construction.
    pub fn from_store(store: &dyn WeightStore, level: usize) -> Result<Self> {
        let mut layers = Vec::with_capacity(REFINER_CHANNELS.len() - 1);
        for layer in 0..REFINER_CHANNELS.len() - 1 {
            layers.push(Conv2d::from_store(
                store,
                WeightGroup::FlowRefiner,
                level,
                layer,
                REFINER_CHANNELS[layer + 1],
                REFINER_CHANNELS[layer],
                REFINER_KERNEL,
                REFINER_PADDING,
            )?);
        }
        Ok(Self { layers })
    }

    /// Predict a flow residual from an 8-channel input tensor.
    pub fn forward(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let last = self.layers.len() - 1;
        let mut current = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            current = layer.forward(&current)?;
            if i < last {
                relu(&mut current);
            }
        }
        Ok(current)
    }
}
