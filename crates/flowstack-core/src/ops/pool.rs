use ndarray::Array4;

/// 2x2 average pooling with stride 2.
///
/// Output extents are floor-halved; a trailing odd row/column does not
/// contribute.
pub fn avg_pool2d(input: &Array4<f32>) -> Array4<f32> {
    let (batch, channels, h, w) = input.dim();
    let out_h = h / 2;
    let out_w = w / 2;

    let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
    for b in 0..batch {
        for c in 0..channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let y = oy * 2;
                    let x = ox * 2;
                    output[[b, c, oy, ox]] = 0.25
                        * (input[[b, c, y, x]]
                            + input[[b, c, y, x + 1]]
                            + input[[b, c, y + 1, x]]
                            + input[[b, c, y + 1, x + 1]]);
                }
            }
        }
    }

    output
}

/// 2x2 max pooling with stride 2, floor output extents.
pub fn max_pool2d(input: &Array4<f32>) -> Array4<f32> {
    let (batch, channels, h, w) = input.dim();
    let out_h = h / 2;
    let out_w = w / 2;

    let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
    for b in 0..batch {
        for c in 0..channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let y = oy * 2;
                    let x = ox * 2;
                    output[[b, c, oy, ox]] = input[[b, c, y, x]]
                        .max(input[[b, c, y, x + 1]])
                        .max(input[[b, c, y + 1, x]])
                        .max(input[[b, c, y + 1, x + 1]]);
                }
            }
        }
    }

    output
}
