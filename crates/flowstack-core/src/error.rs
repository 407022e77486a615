use thiserror::Error;

use crate::weights::WeightKey;

#[derive(Error, Debug)]
pub enum FlowStackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid weight bank: {0}")]
    InvalidBank(String),

    #[error("Missing weight entry: {key}")]
    MissingWeight { key: WeightKey },

    #[error("Weight entry {key} has shape {got:?}, expected {expected:?}")]
    WeightShape {
        key: WeightKey,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Shape mismatch in {context}: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, FlowStackError>;
