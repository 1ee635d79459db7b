pub mod app;
pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod export;
pub mod filters;
pub mod font;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod presets;
pub mod stream;
pub mod ttf;
pub mod types;

pub use error::{Result, VeinError};
pub use pipeline::{Stage, VeinPipeline};
pub use types::{PipelineOutput, PipelineParameters, RgbFrame};
