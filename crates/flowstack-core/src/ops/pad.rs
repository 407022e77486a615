use ndarray::Array4;

/// Append `extra_bottom` rows and `extra_right` columns by replicating the
/// edge values.
pub fn replicate_pad(input: &Array4<f32>, extra_bottom: usize, extra_right: usize) -> Array4<f32> {
    let (batch, channels, h, w) = input.dim();
    let out_h = h + extra_bottom;
    let out_w = w + extra_right;

    let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
    for b in 0..batch {
        for c in 0..channels {
            for y in 0..out_h {
                let sy = y.min(h - 1);
                for x in 0..out_w {
                    let sx = x.min(w - 1);
                    output[[b, c, y, x]] = input[[b, c, sy, sx]];
                }
            }
        }
    }

    output
}
