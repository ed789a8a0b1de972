//! Result export

pub mod json;

pub use json::{JsonGroup, OutputError, OutputGroup};
