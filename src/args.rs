use std::path::PathBuf;

use clap::Parser;

use vein_overlay::pipeline::Polarity;
use vein_overlay::presets::Preset;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera index (e.g. 0), MJPEG stream URL, or image file
    #[arg(short, long)]
    pub source: Option<String>,

    /// Pipeline preset
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Configuration file (defaults to ./config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Downscale factor applied before processing
    #[arg(long)]
    pub scale: Option<f32>,

    /// Directory for saved snapshots
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Whether veins read as bright or dark after contrast enhancement
    #[arg(long, value_enum)]
    pub polarity: Option<Polarity>,

    /// Consecutive failed reads before the source counts as lost
    #[arg(long)]
    pub max_read_failures: Option<u32>,

    /// Only show the overlay window
    #[arg(long, default_value_t = false)]
    pub no_intermediates: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}
