pub mod config;
pub mod consts;
pub mod correction;
pub mod error;
pub mod flow;
pub mod fusion;
pub mod ops;
pub mod pipeline;
pub mod visualize;
pub mod warp;
pub mod weights;
