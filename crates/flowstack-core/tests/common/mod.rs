use ndarray::{Array4, Array5, ArrayD, IxDyn};

use flowstack_core::consts::{
    PYRAMID_LEVEL_COUNT, REFINER_CHANNELS, REFINER_KERNEL, WINDOW_SIZE,
};
use flowstack_core::correction::LocalizationNet;
use flowstack_core::weights::{MemoryStore, WeightGroup, WeightKey, WeightKind};

pub fn zeros(shape: &[usize]) -> ArrayD<f32> {
    ArrayD::zeros(IxDyn(shape))
}

fn insert_pair(
    store: &mut MemoryStore,
    group: WeightGroup,
    level: usize,
    layer: usize,
    weight: ArrayD<f32>,
    bias: ArrayD<f32>,
) {
    store.insert(WeightKey::new(group, level, layer, WeightKind::Weight), weight);
    store.insert(WeightKey::new(group, level, layer, WeightKind::Bias), bias);
}

/// All-zero refiner weights for every pyramid level: the estimator then
/// predicts a zero residual at each level, so the final flow is exactly
/// the accumulated (zero) initialization.
pub fn insert_zero_refiners(store: &mut MemoryStore) {
    for level in 0..PYRAMID_LEVEL_COUNT {
        for layer in 0..REFINER_CHANNELS.len() - 1 {
            insert_pair(
                store,
                WeightGroup::FlowRefiner,
                level,
                layer,
                zeros(&[
                    REFINER_CHANNELS[layer + 1],
                    REFINER_CHANNELS[layer],
                    REFINER_KERNEL,
                    REFINER_KERNEL,
                ]),
                zeros(&[REFINER_CHANNELS[layer + 1]]),
            );
        }
    }
}

/// Fusion weights wired as an identity map on non-negative inputs: conv1
/// routes each color channel through a centered delta kernel, conv2 is a
/// 64-channel identity, conv3 selects the first three channels back out.
pub fn insert_identity_fusion(store: &mut MemoryStore) {
    let mut conv1 = Array4::<f32>::zeros((64, 3, 9, 9));
    for c in 0..3 {
        conv1[[c, c, 4, 4]] = 1.0;
    }
    insert_pair(
        store,
        WeightGroup::Fusion,
        0,
        0,
        conv1.into_dyn(),
        zeros(&[64]),
    );

    let mut conv2 = Array4::<f32>::zeros((64, 64, 1, 1));
    for c in 0..64 {
        conv2[[c, c, 0, 0]] = 1.0;
    }
    insert_pair(
        store,
        WeightGroup::Fusion,
        0,
        1,
        conv2.into_dyn(),
        zeros(&[64]),
    );

    let mut conv3 = Array4::<f32>::zeros((3, 64, 1, 1));
    for c in 0..3 {
        conv3[[c, c, 0, 0]] = 1.0;
    }
    insert_pair(
        store,
        WeightGroup::Fusion,
        0,
        2,
        conv3.into_dyn(),
        zeros(&[3]),
    );
}

/// Zeroed localization convolutions for the frame correction path.
pub fn insert_zero_frame_localization(store: &mut MemoryStore) {
    insert_pair(
        store,
        WeightGroup::FrameLocalization,
        0,
        0,
        zeros(&[8, 3, 7, 7]),
        zeros(&[8]),
    );
    insert_pair(
        store,
        WeightGroup::FrameLocalization,
        0,
        1,
        zeros(&[10, 8, 5, 5]),
        zeros(&[10]),
    );
}

/// Zeroed localization convolutions for the flow correction path.
pub fn insert_zero_flow_localization(store: &mut MemoryStore) {
    insert_pair(
        store,
        WeightGroup::FlowLocalization,
        0,
        0,
        zeros(&[8, 2, 7, 7]),
        zeros(&[8]),
    );
    insert_pair(
        store,
        WeightGroup::FlowLocalization,
        0,
        1,
        zeros(&[10, 8, 5, 5]),
        zeros(&[10]),
    );
}

/// Affine head that always regresses the identity transform: zero weights
/// everywhere, final bias set to unit scale and no translation.
pub fn insert_identity_affine_head(store: &mut MemoryStore, height: usize, width: usize) {
    let flat =
        10 * LocalizationNet::feature_extent(height) * LocalizationNet::feature_extent(width);
    insert_pair(
        store,
        WeightGroup::AffineHead,
        0,
        0,
        zeros(&[32, flat]),
        zeros(&[32]),
    );
    let bias = ArrayD::from_shape_vec(IxDyn(&[6]), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
        .expect("identity bias");
    insert_pair(store, WeightGroup::AffineHead, 0, 1, zeros(&[6, 32]), bias);
}

/// A complete store that turns the whole pipeline into an identity map:
/// zero flow residuals, identity spatial correction, identity fusion.
pub fn identity_pipeline_store(height: usize, width: usize, with_flow_path: bool) -> MemoryStore {
    let mut store = MemoryStore::new();
    insert_zero_refiners(&mut store);
    insert_zero_frame_localization(&mut store);
    if with_flow_path {
        insert_zero_flow_localization(&mut store);
    }
    insert_identity_affine_head(&mut store, height, width);
    insert_identity_fusion(&mut store);
    store
}

/// A smooth, non-constant test frame: values stay within [0, 1].
pub fn gradient_frame(batch: usize, height: usize, width: usize) -> Array4<f32> {
    let mut frame = Array4::<f32>::zeros((batch, 3, height, width));
    for b in 0..batch {
        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let fy = y as f32 / height as f32;
                    let fx = x as f32 / width as f32;
                    frame[[b, c, y, x]] = (0.2 + 0.5 * fy + 0.25 * fx + 0.05 * c as f32).min(1.0);
                }
            }
        }
    }
    frame
}

/// A seven-frame window where every frame is the same gradient image.
pub fn identical_frame_window(batch: usize, height: usize, width: usize) -> Array5<f32> {
    let frame = gradient_frame(batch, height, width);
    let mut window = Array5::<f32>::zeros((batch, WINDOW_SIZE, 3, height, width));
    for i in 0..WINDOW_SIZE {
        window
            .index_axis_mut(ndarray::Axis(1), i)
            .assign(&frame);
    }
    window
}
