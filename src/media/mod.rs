//! Media inspection: external probing and aspect-ratio classification.

pub mod aspect;
pub mod probe;

pub use aspect::AspectRatio;
pub use probe::{Dimensions, FfprobeProber, MediaProber, ProbeError};
