use ndarray::Array4;

use crate::error::Result;
use crate::ops::grid_sample_border;

use super::{check_warp_shapes, FlowResampler};

/// Base sampling grid cached between calls.
///
/// The grid is pure derived state: it depends only on the invalidation
/// key `(batch, height, width)` and is rebuilt whenever any component of
/// the key changes.
#[derive(Clone, Debug)]
struct GridCache {
    batch: usize,
    height: usize,
    width: usize,
    /// `(batch, height, width, 2)` identity grid in [-1, 1].
    grid: Array4<f32>,
}

impl GridCache {
    fn build(batch: usize, height: usize, width: usize) -> Self {
        let mut grid = Array4::<f32>::zeros((batch, height, width, 2));
        for b in 0..batch {
            for y in 0..height {
                let ny = -1.0 + 2.0 * y as f32 / (height as f32 - 1.0);
                for x in 0..width {
                    let nx = -1.0 + 2.0 * x as f32 / (width as f32 - 1.0);
                    grid[[b, y, x, 0]] = nx;
                    grid[[b, y, x, 1]] = ny;
                }
            }
        }
        Self {
            batch,
            height,
            width,
            grid,
        }
    }

    fn matches(&self, batch: usize, height: usize, width: usize) -> bool {
        self.batch == batch && self.height == height && self.width == width
    }
}

/// Backward warp via normalized-coordinate offsets.
///
/// Converts a pixel-unit flow field into normalized offsets (dividing each
/// channel by half the corresponding extent minus one), adds them to a
/// cached identity grid, and resamples with bilinear border-clamped
/// interpolation. Used inside the pyramid refinement loop.
#[derive(Clone, Debug, Default)]
pub struct BackwardWarp {
    cache: Option<GridCache>,
}

impl BackwardWarp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlowResampler for BackwardWarp {
    fn warp(&mut self, image: &Array4<f32>, flow: &Array4<f32>) -> Result<Array4<f32>> {
        check_warp_shapes(image, flow)?;
        let (batch, _, height, width) = image.dim();

        let cache = match self.cache.take() {
            Some(c) if c.matches(batch, height, width) => c,
            _ => GridCache::build(batch, height, width),
        };

        // Pixel displacements -> normalized-coordinate displacements.
        let half_w = (width as f32 - 1.0) / 2.0;
        let half_h = (height as f32 - 1.0) / 2.0;

        let mut grid = cache.grid.clone();
        for b in 0..batch {
            for y in 0..height {
                for x in 0..width {
                    grid[[b, y, x, 0]] += flow[[b, 0, y, x]] / half_w;
                    grid[[b, y, x, 1]] += flow[[b, 1, y, x]] / half_h;
                }
            }
        }

        self.cache = Some(cache);
        grid_sample_border(image, &grid)
    }
}
