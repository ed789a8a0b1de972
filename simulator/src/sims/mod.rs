//! Simulation drivers

pub mod observe;

pub use observe::{build_channels, observe_target, observe_targets, PipelineError, TargetResult};
