//! Image pyramids and flow-field upsampling for coarse-to-fine estimation.

use ndarray::Array4;

use crate::consts::{PYRAMID_MAX_DOWNSAMPLES, PYRAMID_MIN_EXTENT};
use crate::error::{FlowStackError, Result};
use crate::ops::{avg_pool2d, replicate_pad, upsample_bilinear_2x};

/// Build a multi-resolution pyramid by repeated 2x average pooling.
///
/// Returns levels ordered coarsest first; the original-resolution tensor
/// is always the last element. Downsampling continues while either
/// spatial extent exceeds [`PYRAMID_MIN_EXTENT`], but at most
/// [`PYRAMID_MAX_DOWNSAMPLES`] steps are attempted regardless of size, so
/// very large inputs keep a coarsest level above the size rule.
pub fn build_pyramid(frame: &Array4<f32>) -> Vec<Array4<f32>> {
    let mut pyramid = Vec::with_capacity(PYRAMID_MAX_DOWNSAMPLES + 1);
    pyramid.push(frame.clone());

    for _ in 0..PYRAMID_MAX_DOWNSAMPLES {
        let (_, _, h, w) = pyramid[0].dim();
        if h > PYRAMID_MIN_EXTENT || w > PYRAMID_MIN_EXTENT {
            let downsampled = avg_pool2d(&pyramid[0]);
            pyramid.insert(0, downsampled);
        }
    }

    pyramid
}

/// Upsample a flow field to the next-finer pyramid level.
///
/// Doubles the spatial extent by align-corners bilinear interpolation and
/// doubles the displacement values, since flow is expressed in pixel units
/// of its own resolution. Non-power-of-two inputs leave the doubled field
/// one row/column short of the target; that gap is closed by edge
/// replication, checked independently per axis. Any residual mismatch is
/// a fatal shape error.
pub fn upsample_flow(flow: &Array4<f32>, target_h: usize, target_w: usize) -> Result<Array4<f32>> {
    let mut upsampled = upsample_bilinear_2x(flow);
    upsampled.mapv_inplace(|v| v * 2.0);

    let (_, _, h, w) = upsampled.dim();
    let extra_bottom = match target_h.checked_sub(h) {
        Some(d) if d <= 1 => d,
        _ => {
            return Err(FlowStackError::ShapeMismatch {
                context: "flow upsample height",
                expected: vec![target_h],
                got: vec![h],
            })
        }
    };
    let extra_right = match target_w.checked_sub(w) {
        Some(d) if d <= 1 => d,
        _ => {
            return Err(FlowStackError::ShapeMismatch {
                context: "flow upsample width",
                expected: vec![target_w],
                got: vec![w],
            })
        }
    };

    if extra_bottom > 0 || extra_right > 0 {
        upsampled = replicate_pad(&upsampled, extra_bottom, extra_right);
    }

    Ok(upsampled)
}
