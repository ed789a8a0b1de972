//! Optical elements, paths and the conversion of diffuse light to signal.

pub mod diffuse;
pub mod element;
pub mod geometry;
pub mod path;
pub mod psf;

pub use element::{OpticalElement, Position};
pub use geometry::omega_pix;
pub use path::{OpticalPath, PathProducts};
