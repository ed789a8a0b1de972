//! Photometry models and utilities

pub mod planck;
pub mod quantum_efficiency;
pub mod signal;

pub use planck::planck;
pub use quantum_efficiency::QuantumEfficiency;
pub use signal::Signal;
