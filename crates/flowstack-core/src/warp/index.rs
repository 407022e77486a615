use ndarray::{Array3, Array4};

use crate::error::{FlowStackError, Result};
use crate::ops::grid_sample_border;

use super::{check_warp_shapes, FlowResampler};

/// Backward warp via raw pixel indices.
///
/// Keeps an additive coordinate grid in pixel units, built once at
/// construction for a fixed `(height, width)`. Flow is added to the pixel
/// indices first and the sum is normalized to [-1, 1] afterwards, which
/// makes this numerically distinct from [`super::BackwardWarp`]. Used for
/// the final seven-frame fusion step.
#[derive(Clone, Debug)]
pub struct IndexWarp {
    height: usize,
    width: usize,
    /// `(2, height, width)` pixel-index grid: channel 0 holds column
    /// indices, channel 1 row indices.
    addterm: Array3<f32>,
}

impl IndexWarp {
    pub fn new(height: usize, width: usize) -> Result<Self> {
        if height < 2 || width < 2 {
            return Err(FlowStackError::InvalidDimensions { width, height });
        }

        let mut addterm = Array3::<f32>::zeros((2, height, width));
        for y in 0..height {
            for x in 0..width {
                addterm[[0, y, x]] = x as f32;
                addterm[[1, y, x]] = y as f32;
            }
        }

        Ok(Self {
            height,
            width,
            addterm,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl FlowResampler for IndexWarp {
    fn warp(&mut self, image: &Array4<f32>, flow: &Array4<f32>) -> Result<Array4<f32>> {
        check_warp_shapes(image, flow)?;
        let (batch, _, height, width) = image.dim();
        if height != self.height || width != self.width {
            return Err(FlowStackError::ShapeMismatch {
                context: "index warp extent",
                expected: vec![self.height, self.width],
                got: vec![height, width],
            });
        }

        let scale_x = 2.0 / (width as f32 - 1.0);
        let scale_y = 2.0 / (height as f32 - 1.0);

        let mut grid = Array4::<f32>::zeros((batch, height, width, 2));
        for b in 0..batch {
            for y in 0..height {
                for x in 0..width {
                    let px = flow[[b, 0, y, x]] + self.addterm[[0, y, x]];
                    let py = flow[[b, 1, y, x]] + self.addterm[[1, y, x]];
                    grid[[b, y, x, 0]] = px * scale_x - 1.0;
                    grid[[b, y, x, 1]] = py * scale_y - 1.0;
                }
            }
        }

        grid_sample_border(image, &grid)
    }
}
