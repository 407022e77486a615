//! Debug visualization: flow fields as Middlebury color images, plus a
//! write-only sink the pipeline can persist intermediates through.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{Array2, Array3, ArrayView3};

use crate::consts::{FLOW_RADIUS_EPSILON, UNKNOWN_FLOW_THRESH};
use crate::error::Result;

/// Segment sizes of the Middlebury color wheel
/// (red-yellow, yellow-green, green-cyan, cyan-blue, blue-magenta,
/// magenta-red).
const WHEEL_SEGMENTS: [usize; 6] = [15, 6, 4, 11, 13, 6];

/// Middlebury color wheel: one RGB row per hue bin.
pub struct ColorWheel {
    colors: Array2<f32>,
}

impl Default for ColorWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorWheel {
    pub fn new() -> Self {
        let ncols: usize = WHEEL_SEGMENTS.iter().sum();
        let mut colors = Array2::<f32>::zeros((ncols, 3));
        let [ry, yg, gc, cb, bm, mr] = WHEEL_SEGMENTS;

        let ramp = |n: usize, i: usize| 255.0 * i as f32 / (n as f32 - 1.0);

        let mut col = 0;
        for i in 0..ry {
            colors[[col + i, 0]] = 255.0;
            colors[[col + i, 1]] = ramp(ry, i);
        }
        col += ry;
        for i in 0..yg {
            colors[[col + i, 0]] = 255.0 - ramp(yg, i);
            colors[[col + i, 1]] = 255.0;
        }
        col += yg;
        for i in 0..gc {
            colors[[col + i, 1]] = 255.0;
            colors[[col + i, 2]] = ramp(gc, i);
        }
        col += gc;
        for i in 0..cb {
            colors[[col + i, 1]] = 255.0 - ramp(cb, i);
            colors[[col + i, 2]] = 255.0;
        }
        col += cb;
        for i in 0..bm {
            colors[[col + i, 0]] = ramp(bm, i);
            colors[[col + i, 2]] = 255.0;
        }
        col += bm;
        for i in 0..mr {
            colors[[col + i, 0]] = 255.0;
            colors[[col + i, 2]] = 255.0 - ramp(mr, i);
        }

        Self { colors }
    }

    pub fn ncols(&self) -> usize {
        self.colors.dim().0
    }

    /// Render a `(2, height, width)` flow field as an RGB image.
    ///
    /// Components above [`UNKNOWN_FLOW_THRESH`] are treated as unknown and
    /// rendered black; displacements are normalized by the maximum radius
    /// (epsilon-guarded so zero flow stays finite).
    pub fn flow_to_image(&self, flow: &ArrayView3<f32>) -> Array3<u8> {
        let (_, h, w) = flow.dim();

        let mut u = Array2::<f32>::zeros((h, w));
        let mut v = Array2::<f32>::zeros((h, w));
        let mut unknown = Array2::<bool>::from_elem((h, w), false);

        for y in 0..h {
            for x in 0..w {
                let fu = flow[[0, y, x]];
                let fv = flow[[1, y, x]];
                if fu.abs() > UNKNOWN_FLOW_THRESH || fv.abs() > UNKNOWN_FLOW_THRESH {
                    unknown[[y, x]] = true;
                } else {
                    u[[y, x]] = fu;
                    v[[y, x]] = fv;
                }
            }
        }

        let mut maxrad = -1.0f32;
        for y in 0..h {
            for x in 0..w {
                let rad = (u[[y, x]] * u[[y, x]] + v[[y, x]] * v[[y, x]]).sqrt();
                maxrad = maxrad.max(rad);
            }
        }

        let scale = 1.0 / (maxrad + FLOW_RADIUS_EPSILON);
        u.mapv_inplace(|x| x * scale);
        v.mapv_inplace(|x| x * scale);

        let mut img = self.compute_color(&u, &v);
        for y in 0..h {
            for x in 0..w {
                if unknown[[y, x]] {
                    for c in 0..3 {
                        img[[y, x, c]] = 0;
                    }
                }
            }
        }
        img
    }

    /// Map normalized flow components to wheel colors. Pixels where either
    /// component is NaN are zeroed before the radius/angle computation and
    /// rendered black.
    fn compute_color(&self, u: &Array2<f32>, v: &Array2<f32>) -> Array3<u8> {
        let (h, w) = u.dim();
        let ncols = self.ncols();
        let mut img = Array3::<u8>::zeros((h, w, 3));

        for y in 0..h {
            for x in 0..w {
                let mut fu = u[[y, x]];
                let mut fv = v[[y, x]];
                let nan = fu.is_nan() || fv.is_nan();
                if nan {
                    fu = 0.0;
                    fv = 0.0;
                }

                let rad = (fu * fu + fv * fv).sqrt();
                let angle = (-fv).atan2(-fu) / std::f32::consts::PI;

                let fk = (angle + 1.0) / 2.0 * (ncols as f32 - 1.0) + 1.0;
                let k0 = fk.floor() as usize;
                let k1 = if k0 + 1 == ncols + 1 { 1 } else { k0 + 1 };
                let f = fk - k0 as f32;

                for c in 0..3 {
                    let col0 = self.colors[[k0 - 1, c]] / 255.0;
                    let col1 = self.colors[[k1 - 1, c]] / 255.0;
                    let mut col = (1.0 - f) * col0 + f * col1;

                    if rad <= 1.0 {
                        col = 1.0 - rad * (1.0 - col);
                    } else {
                        col *= 0.75;
                    }
                    if nan {
                        col = 0.0;
                    }
                    img[[y, x, c]] = (255.0 * col).floor() as u8;
                }
            }
        }

        img
    }
}

/// Convert a `(3, height, width)` frame in [0, 1] to an RGB byte image.
pub fn frame_to_image(frame: &ArrayView3<f32>) -> Array3<u8> {
    let (_, h, w) = frame.dim();
    let mut img = Array3::<u8>::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                img[[y, x, c]] = (frame[[c, y, x]].clamp(0.0, 1.0) * 255.0) as u8;
            }
        }
    }
    img
}

/// Write-only sink for debug images. The pipeline never reads anything
/// back from it.
pub trait VisualSink: Send + Sync {
    /// Persist an `(height, width, 3)` RGB image under `name`.
    fn save_image(&self, name: &str, image: &Array3<u8>) -> Result<()>;
}

/// Sink that drops everything, used when visualization is off.
pub struct NoOpSink;

impl VisualSink for NoOpSink {
    fn save_image(&self, _name: &str, _image: &Array3<u8>) -> Result<()> {
        Ok(())
    }
}

/// Sink writing PNG files into a directory.
pub struct PngDirSink {
    dir: PathBuf,
}

impl PngDirSink {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl VisualSink for PngDirSink {
    fn save_image(&self, name: &str, image: &Array3<u8>) -> Result<()> {
        let (h, w, _) = image.dim();
        let mut png = RgbImage::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                png.put_pixel(
                    x as u32,
                    y as u32,
                    image::Rgb([image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]]]),
                );
            }
        }
        png.save(self.dir.join(format!("{name}.png")))?;
        Ok(())
    }
}
