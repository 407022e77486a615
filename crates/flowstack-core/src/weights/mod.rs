//! Key-addressed storage for learned layer parameters.
//!
//! Every learned stage of the pipeline loads its tensors once at
//! construction through the [`WeightStore`] trait; a lookup failure is a
//! fatal construction error, never a degraded model. The storage format
//! behind the trait is swappable without touching model topology code.

pub mod bank;

use std::collections::HashMap;
use std::fmt;

use ndarray::ArrayD;

use crate::error::{FlowStackError, Result};

pub use bank::{BankWriter, FileBank};

/// Which learned stage a weight tensor belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeightGroup {
    /// Per-pyramid-level flow refiner stacks; `level` is the pyramid level.
    FlowRefiner,
    /// Localization convolutions of the frame correction path.
    FrameLocalization,
    /// Localization convolutions of the flow correction path.
    FlowLocalization,
    /// Fully-connected affine regressor shared by both correction paths.
    AffineHead,
    /// Final fusion convolution stack.
    Fusion,
}

impl WeightGroup {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::FlowRefiner => 0,
            Self::FrameLocalization => 1,
            Self::FlowLocalization => 2,
            Self::AffineHead => 3,
            Self::Fusion => 4,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::FlowRefiner),
            1 => Some(Self::FrameLocalization),
            2 => Some(Self::FlowLocalization),
            3 => Some(Self::AffineHead),
            4 => Some(Self::Fusion),
            _ => None,
        }
    }
}

impl fmt::Display for WeightGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FlowRefiner => "refiner",
            Self::FrameLocalization => "frame-localization",
            Self::FlowLocalization => "flow-localization",
            Self::AffineHead => "affine-head",
            Self::Fusion => "fusion",
        };
        write!(f, "{name}")
    }
}

/// Weight tensor vs its bias vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeightKind {
    Weight,
    Bias,
}

impl WeightKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Weight => 0,
            Self::Bias => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Weight),
            1 => Some(Self::Bias),
            _ => None,
        }
    }
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weight => write!(f, "weight"),
            Self::Bias => write!(f, "bias"),
        }
    }
}

/// Address of one tensor in a weight store.
///
/// `level` indexes the pyramid level for [`WeightGroup::FlowRefiner`] and
/// is zero for the other groups; `layer` indexes layers within the stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeightKey {
    pub group: WeightGroup,
    pub level: usize,
    pub layer: usize,
    pub kind: WeightKind,
}

impl WeightKey {
    pub fn new(group: WeightGroup, level: usize, layer: usize, kind: WeightKind) -> Self {
        Self {
            group,
            level,
            layer,
            kind,
        }
    }
}

impl fmt::Display for WeightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/L{}/{}/{}",
            self.group, self.level, self.layer, self.kind
        )
    }
}

/// Fetch a tensor and check it against the shape the target layer declares.
pub fn load_tensor(
    store: &dyn WeightStore,
    key: WeightKey,
    expected: &[usize],
) -> Result<ArrayD<f32>> {
    let tensor = store.tensor(&key)?;
    if tensor.shape() != expected {
        return Err(FlowStackError::WeightShape {
            key,
            expected: expected.to_vec(),
            got: tensor.shape().to_vec(),
        });
    }
    Ok(tensor)
}

/// Read-only key-value access to learned parameters.
pub trait WeightStore {
    /// Fetch the tensor stored under `key`.
    ///
    /// A missing key is an error; callers treat it as fatal at model
    /// construction time.
    fn tensor(&self, key: &WeightKey) -> Result<ArrayD<f32>>;
}

/// In-memory weight store, for tests and programmatic model assembly.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<WeightKey, ArrayD<f32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, replacing any previous entry under the same key.
    pub fn insert(&mut self, key: WeightKey, tensor: ArrayD<f32>) {
        self.entries.insert(key, tensor);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WeightStore for MemoryStore {
    fn tensor(&self, key: &WeightKey) -> Result<ArrayD<f32>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or(FlowStackError::MissingWeight { key: *key })
    }
}
