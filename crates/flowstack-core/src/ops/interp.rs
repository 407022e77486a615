use ndarray::Array4;

/// Upsample a `(batch, channels, h, w)` tensor to exactly `(2h, 2w)` by
/// bilinear interpolation with align-corners coordinate mapping.
pub fn upsample_bilinear_2x(input: &Array4<f32>) -> Array4<f32> {
    let (batch, channels, h, w) = input.dim();
    let out_h = h * 2;
    let out_w = w * 2;

    // align-corners: output corner samples coincide with input corners.
    let scale_y = if out_h > 1 {
        (h as f64 - 1.0) / (out_h as f64 - 1.0)
    } else {
        0.0
    };
    let scale_x = if out_w > 1 {
        (w as f64 - 1.0) / (out_w as f64 - 1.0)
    } else {
        0.0
    };

    let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
    for b in 0..batch {
        for c in 0..channels {
            for oy in 0..out_h {
                let sy = oy as f64 * scale_y;
                let y0 = sy.floor() as usize;
                let y1 = (y0 + 1).min(h - 1);
                let fy = (sy - y0 as f64) as f32;

                for ox in 0..out_w {
                    let sx = ox as f64 * scale_x;
                    let x0 = sx.floor() as usize;
                    let x1 = (x0 + 1).min(w - 1);
                    let fx = (sx - x0 as f64) as f32;

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

    output
}
