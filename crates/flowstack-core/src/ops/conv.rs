use ndarray::{Array1, Array2, Array4, Dimension};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{FlowStackError, Result};
use crate::weights::{load_tensor, WeightGroup, WeightKey, WeightKind, WeightStore};

/// Stride-1 2D convolution with symmetric zero padding.
#[derive(Clone, Debug)]
pub struct Conv2d {
    weight: Array4<f32>,
    bias: Array1<f32>,
    padding: usize,
}

impl Conv2d {
    /// Build from explicit parameters. Weight shape is
    /// `(out_channels, in_channels, kernel, kernel)`.
    pub fn new(weight: Array4<f32>, bias: Array1<f32>, padding: usize) -> Result<Self> {
        let (out_ch, _, kh, kw) = weight.dim();
        if bias.len() != out_ch {
            return Err(FlowStackError::ShapeMismatch {
                context: "conv2d bias",
                expected: vec![out_ch],
                got: vec![bias.len()],
            });
        }
        if kh != kw {
            return Err(FlowStackError::ShapeMismatch {
                context: "conv2d kernel",
                expected: vec![kh, kh],
                got: vec![kh, kw],
            });
        }
        Ok(Self {
            weight,
            bias,
            padding,
        })
    }

    /// Load weight and bias from a store and validate their shapes.
    pub fn from_store(
        store: &dyn WeightStore,
        group: WeightGroup,
        level: usize,
        layer: usize,
        out_channels: usize,
        in_channels: usize,
        kernel: usize,
        padding: usize,
    ) -> Result<Self> {
        let weight = load_tensor(
            store,
            WeightKey::new(group, level, layer, WeightKind::Weight),
            &[out_channels, in_channels, kernel, kernel],
        )?;
        let bias = load_tensor(
            store,
            WeightKey::new(group, level, layer, WeightKind::Bias),
            &[out_channels],
        )?;

        let weight = weight
            .into_dimensionality()
            .map_err(|e| FlowStackError::Pipeline(format!("conv weight rank: {e}")))?;
        let bias = bias
            .into_dimensionality()
            .map_err(|e| FlowStackError::Pipeline(format!("conv bias rank: {e}")))?;

        Self::new(weight, bias, padding)
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    /// Apply the convolution to a `(batch, channels, height, width)` tensor.
    pub fn forward(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (batch, in_ch, h, w) = input.dim();
        let (out_ch, expect_in, kh, kw) = self.weight.dim();

        if in_ch != expect_in {
            return Err(FlowStackError::ShapeMismatch {
                context: "conv2d input channels",
                expected: vec![expect_in],
                got: vec![in_ch],
            });
        }

        let padded_h = h + 2 * self.padding;
        let padded_w = w + 2 * self.padding;
        if padded_h < kh || padded_w < kw {
            return Err(FlowStackError::ShapeMismatch {
                context: "conv2d spatial extent",
                expected: vec![kh, kw],
                got: vec![padded_h, padded_w],
            });
        }
        let out_h = padded_h - kh + 1;
        let out_w = padded_w - kw + 1;

        let indices: Vec<(usize, usize)> = (0..batch)
            .flat_map(|b| (0..out_ch).map(move |co| (b, co)))
            .collect();

        let planes: Vec<Array2<f32>> = if batch * out_ch * out_h * out_w >= PARALLEL_PIXEL_THRESHOLD
        {
            indices
                .par_iter()
                .map(|&(b, co)| self.plane(input, b, co, out_h, out_w))
                .collect()
        } else {
            indices
                .iter()
                .map(|&(b, co)| self.plane(input, b, co, out_h, out_w))
                .collect()
        };

        let mut output = Array4::<f32>::zeros((batch, out_ch, out_h, out_w));
        for (&(b, co), plane) in indices.iter().zip(planes) {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    output[[b, co, oy, ox]] = plane[[oy, ox]];
                }
            }
        }

        Ok(output)
    }

    /// Compute one output plane for a (batch, out-channel) pair.
    fn plane(
        &self,
        input: &Array4<f32>,
        b: usize,
        co: usize,
        out_h: usize,
        out_w: usize,
    ) -> Array2<f32> {
        let (_, in_ch, h, w) = input.dim();
        let (_, _, kh, kw) = self.weight.dim();
        let pad = self.padding as isize;

        let mut plane = Array2::<f32>::zeros((out_h, out_w));
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum = self.bias[co];
                for ci in 0..in_ch {
                    for ky in 0..kh {
                        let iy = oy as isize + ky as isize - pad;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for kx in 0..kw {
                            let ix = ox as isize + kx as isize - pad;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            sum += input[[b, ci, iy as usize, ix as usize]]
                                * self.weight[[co, ci, ky, kx]];
                        }
                    }
                }
                plane[[oy, ox]] = sum;
            }
        }
        plane
    }
}

/// Fully-connected layer.
#[derive(Clone, Debug)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// Build from explicit parameters. Weight shape is `(out, in)`.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        let (out_f, _) = weight.dim();
        if bias.len() != out_f {
            return Err(FlowStackError::ShapeMismatch {
                context: "linear bias",
                expected: vec![out_f],
                got: vec![bias.len()],
            });
        }
        Ok(Self { weight, bias })
    }

    /// Load weight and bias from a store and validate their shapes.
    pub fn from_store(
        store: &dyn WeightStore,
        group: WeightGroup,
        layer: usize,
        out_features: usize,
        in_features: usize,
    ) -> Result<Self> {
        let weight = load_tensor(
            store,
            WeightKey::new(group, 0, layer, WeightKind::Weight),
            &[out_features, in_features],
        )?;
        let bias = load_tensor(
            store,
            WeightKey::new(group, 0, layer, WeightKind::Bias),
            &[out_features],
        )?;

        let weight = weight
            .into_dimensionality()
            .map_err(|e| FlowStackError::Pipeline(format!("linear weight rank: {e}")))?;
        let bias = bias
            .into_dimensionality()
            .map_err(|e| FlowStackError::Pipeline(format!("linear bias rank: {e}")))?;

        Self::new(weight, bias)
    }

    pub fn in_features(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_features(&self) -> usize {
        self.weight.dim().0
    }

    /// Apply to a `(batch, in_features)` matrix.
    pub fn forward(&self, input: &Array2<f32>) -> Result<Array2<f32>> {
        let (batch, in_f) = input.dim();
        let (out_f, expect_in) = self.weight.dim();
        if in_f != expect_in {
            return Err(FlowStackError::ShapeMismatch {
                context: "linear input features",
                expected: vec![expect_in],
                got: vec![in_f],
            });
        }

        let mut output = Array2::<f32>::zeros((batch, out_f));
        for b in 0..batch {
            for o in 0..out_f {
                let mut sum = self.bias[o];
                for i in 0..in_f {
                    sum += self.weight[[o, i]] * input[[b, i]];
                }
                output[[b, o]] = sum;
            }
        }
        Ok(output)
    }
}

/// Clamp negative values to zero, in place.
pub fn relu<D: Dimension>(data: &mut ndarray::Array<f32, D>) {
    data.mapv_inplace(|v| v.max(0.0));
}
