//! Image-processing primitives the pipeline stages are built from.
//!
//! Edge detection, smoothing, sharpening and morphology come from
//! `imageproc`; what it lacks lives here.

pub mod clahe;
pub mod denoise;
pub mod frangi;
pub mod morph;
pub mod skeleton;
pub mod threshold;

pub use clahe::Clahe;
pub use frangi::Frangi;
