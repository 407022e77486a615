use std::sync::Arc;

use ndarray::{Array4, Array5, Axis};
use tracing::info;

use crate::config::ModelConfig;
use crate::consts::{COLOR_CHANNEL_COUNT, FLOW_CHANNEL_COUNT, REFERENCE_INDEX, WINDOW_SIZE};
use crate::correction::CorrectionNet;
use crate::error::{FlowStackError, Result};
use crate::flow::FlowEstimator;
use crate::fusion::FusionNet;
use crate::visualize::{frame_to_image, ColorWheel, NoOpSink, VisualSink};
use crate::warp::{FlowResampler, IndexWarp};
use crate::weights::WeightStore;

/// Top-level fusion pipeline over a fixed seven-frame window.
///
/// For each non-reference frame: estimate flow to the reference, apply the
/// learned spatial correction, warp into the reference coordinate system.
/// The reference frame passes through with zero flow. The warped stack is
/// then fused into a single output frame.
pub struct FusionPipeline {
    estimator: FlowEstimator,
    correction: CorrectionNet,
    warp: IndexWarp,
    fusion: FusionNet,
    wheel: ColorWheel,
    sink: Arc<dyn VisualSink>,
    height: usize,
    width: usize,
}

impl FusionPipeline {
    /// Build every stage from the weight store for a fixed frame extent.
    /// Any missing or mis-shaped weight aborts construction; there is no
    /// partially-initialized pipeline.
    pub fn from_store(
        store: &dyn WeightStore,
        height: usize,
        width: usize,
        config: &ModelConfig,
    ) -> Result<Self> {
        let estimator = FlowEstimator::from_store(store)?;
        let correction =
            CorrectionNet::from_store(store, height, width, config.enable_flow_correction)?;
        let warp = IndexWarp::new(height, width)?;
        let fusion = FusionNet::from_store(store)?;

        info!(
            height,
            width,
            flow_correction = config.enable_flow_correction,
            "fusion pipeline constructed"
        );

        Ok(Self {
            estimator,
            correction,
            warp,
            fusion,
            wheel: ColorWheel::new(),
            sink: Arc::new(NoOpSink),
            height,
            width,
        })
    }

    /// Replace the visualization sink (defaults to a no-op).
    pub fn with_sink(mut self, sink: Arc<dyn VisualSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Fuse a `(batch, 7, 3, height, width)` frame window into a single
    /// `(batch, 3, height, width)` output frame.
    ///
    /// When `epoch` is given, debug visualizations (first flow field, fused
    /// result) are written through the sink keyed by that index.
    pub fn process(&mut self, frames: &Array5<f32>, epoch: Option<usize>) -> Result<Array4<f32>> {
        let (batch, count, channels, h, w) = frames.dim();
        if count != WINDOW_SIZE
            || channels != COLOR_CHANNEL_COUNT
            || h != self.height
            || w != self.width
        {
            return Err(FlowStackError::ShapeMismatch {
                context: "pipeline input window",
                expected: vec![
                    batch,
                    WINDOW_SIZE,
                    COLOR_CHANNEL_COUNT,
                    self.height,
                    self.width,
                ],
                got: vec![batch, count, channels, h, w],
            });
        }

        let reference = frames.index_axis(Axis(1), REFERENCE_INDEX).to_owned();

        // Flow to the reference for every other frame; the reference itself
        // carries zero flow.
        let mut flows: Vec<Array4<f32>> = Vec::with_capacity(WINDOW_SIZE);
        for i in 0..WINDOW_SIZE {
            if i == REFERENCE_INDEX {
                flows.push(Array4::zeros((batch, FLOW_CHANNEL_COUNT, h, w)));
            } else {
                let target = frames.index_axis(Axis(1), i).to_owned();
                flows.push(self.estimator.estimate(&reference, &target)?);
            }
        }
        info!(window = WINDOW_SIZE, "flow estimation complete");

        if let Some(epoch) = epoch {
            let flow_img = self.wheel.flow_to_image(&flows[0].index_axis(Axis(0), 0));
            self.sink.save_image(&format!("flow{epoch:04}"), &flow_img)?;
        }

        // Learned spatial correction, all seven frames.
        let mut warped = Array5::<f32>::zeros((batch, WINDOW_SIZE, channels, h, w));
        for i in 0..WINDOW_SIZE {
            let frame = frames.index_axis(Axis(1), i).to_owned();
            let (corrected_frame, corrected_flow) = self.correction.correct(&frame, &flows[i])?;

            let result = if i == REFERENCE_INDEX {
                corrected_frame
            } else {
                self.warp.warp(&corrected_frame, &corrected_flow)?
            };
            warped.index_axis_mut(Axis(1), i).assign(&result);
        }
        info!(window = WINDOW_SIZE, "correction and warping complete");

        let fused = self.fusion.fuse(&warped)?;

        if let Some(epoch) = epoch {
            let img = frame_to_image(&fused.index_axis(Axis(0), 0));
            self.sink.save_image(&format!("result{epoch:04}"), &img)?;
        }

        Ok(fused)
    }
}
