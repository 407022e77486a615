/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Number of frames in one fusion window.
pub const WINDOW_SIZE: usize = 7;

/// Index of the reference frame within the window.
pub const REFERENCE_INDEX: usize = 3;

/// Number of channels in a color frame (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Number of channels in a flow field (horizontal, vertical).
pub const FLOW_CHANNEL_COUNT: usize = 2;

/// Maximum number of 2x downsampling steps when building an image pyramid.
/// Checked together with [`PYRAMID_MIN_EXTENT`]; both bounds must hold for
/// another level to be added.
pub const PYRAMID_MAX_DOWNSAMPLES: usize = 3;

/// Downsampling stops once both spatial extents are at or below this.
pub const PYRAMID_MIN_EXTENT: usize = 32;

/// Number of flow refiner units. One per pyramid level; inputs small enough
/// to produce a shallower pyramid leave the coarse refiners unused.
pub const PYRAMID_LEVEL_COUNT: usize = 4;

/// Channel widths through the five-layer flow refiner stack.
pub const REFINER_CHANNELS: [usize; 6] = [8, 32, 64, 32, 16, 2];

/// Convolution kernel size used by every refiner layer.
pub const REFINER_KERNEL: usize = 7;

/// Symmetric zero padding giving the refiner "same"-size outputs.
pub const REFINER_PADDING: usize = 3;

/// Per-channel means subtracted before flow estimation, in input channel
/// order (blue, green, red).
pub const FLOW_INPUT_MEAN: [f32; 3] = [0.406, 0.456, 0.485];

/// Per-channel standard deviations dividing the centered input, in input
/// channel order (blue, green, red).
pub const FLOW_INPUT_STD: [f32; 3] = [0.225, 0.224, 0.229];

/// Flow components above this magnitude are treated as unknown and masked
/// out during visualization.
pub const UNKNOWN_FLOW_THRESH: f32 = 1e7;

/// Epsilon added to the maximum flow radius before normalizing for display.
pub const FLOW_RADIUS_EPSILON: f32 = f32::EPSILON;
