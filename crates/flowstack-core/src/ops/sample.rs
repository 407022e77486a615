use ndarray::{Array3, Array4};

use crate::error::{FlowStackError, Result};

/// Resample `input` at a normalized sampling grid using bilinear
/// interpolation with border clamping.
///
/// `grid` has shape `(batch, out_h, out_w, 2)` with the last axis holding
/// `(x, y)` in [-1, 1], align-corners convention: -1 maps to pixel 0 and
/// +1 to pixel `extent - 1`. Coordinates outside [-1, 1] clamp to the
/// nearest border pixel, so out-of-range flow never reads out of bounds.
pub fn grid_sample_border(input: &Array4<f32>, grid: &Array4<f32>) -> Result<Array4<f32>> {
    let (batch, channels, h, w) = input.dim();
    let (gb, out_h, out_w, two) = grid.dim();

    if gb != batch || two != 2 {
        return Err(FlowStackError::ShapeMismatch {
            context: "sampling grid",
            expected: vec![batch, out_h, out_w, 2],
            got: vec![gb, out_h, out_w, two],
        });
    }
    if h < 2 || w < 2 {
        return Err(FlowStackError::InvalidDimensions {
            width: w,
            height: h,
        });
    }

    let half_w = (w as f32 - 1.0) / 2.0;
    let half_h = (h as f32 - 1.0) / 2.0;

    let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
    for b in 0..batch {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let gx = grid[[b, oy, ox, 0]];
                let gy = grid[[b, oy, ox, 1]];

                // Unnormalize, then clamp the continuous coordinate so the
                // four gathered corners stay in range.
                let ix = ((gx + 1.0) * half_w).clamp(0.0, w as f32 - 1.0);
                let iy = ((gy + 1.0) * half_h).clamp(0.0, h as f32 - 1.0);

                let x0 = ix.floor() as usize;
                let y0 = iy.floor() as usize;
                let x1 = (x0 + 1).min(w - 1);
                let y1 = (y0 + 1).min(h - 1);
                let fx = ix - x0 as f32;
                let fy = iy - y0 as f32;

                for c in 0..channels {
                    let v00 = input[[b, c, y0, x0]];
                    let v10 = input[[b, c, y0, x1]];
                    let v01 = input[[b, c, y1, x0]];
                    let v11 = input[[b, c, y1, x1]];

                    output[[b, c, oy, ox]] = v00 * (1.0 - fx) * (1.0 - fy)
                        + v10 * fx * (1.0 - fy)
                        + v01 * (1.0 - fx) * fy
                        + v11 * fx * fy;
                }
            }
        }
    }

    Ok(output)
}

/// Build a normalized sampling grid from per-batch 2x3 affine transforms.
///
/// `theta` has shape `(batch, 2, 3)` mapping normalized output coordinates
/// `(x, y)` to normalized input coordinates. The returned grid has shape
/// `(batch, height, width, 2)` and feeds [`grid_sample_border`].
pub fn affine_grid(theta: &Array3<f32>, height: usize, width: usize) -> Result<Array4<f32>> {
    let (batch, rows, cols) = theta.dim();
    if rows != 2 || cols != 3 {
        return Err(FlowStackError::ShapeMismatch {
            context: "affine theta",
            expected: vec![batch, 2, 3],
            got: vec![batch, rows, cols],
        });
    }
    if height < 2 || width < 2 {
        return Err(FlowStackError::InvalidDimensions { width, height });
    }

    let mut grid = Array4::<f32>::zeros((batch, height, width, 2));
    for b in 0..batch {
        for y in 0..height {
            let ny = -1.0 + 2.0 * y as f32 / (height as f32 - 1.0);
            for x in 0..width {
                let nx = -1.0 + 2.0 * x as f32 / (width as f32 - 1.0);
                grid[[b, y, x, 0]] =
                    theta[[b, 0, 0]] * nx + theta[[b, 0, 1]] * ny + theta[[b, 0, 2]];
                grid[[b, y, x, 1]] =
                    theta[[b, 1, 0]] * nx + theta[[b, 1, 1]] * ny + theta[[b, 1, 2]];
            }
        }
    }

    Ok(grid)
}
