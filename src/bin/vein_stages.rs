//! Runs one preset over a still image and writes every stage to disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use vein_overlay::camera::{FrameSource, StillImageSource};
use vein_overlay::export::{write_stages, SnapshotWriter};
use vein_overlay::pipeline::{Polarity, VeinPipeline};
use vein_overlay::presets::Preset;
use vein_overlay::PipelineParameters;

#[derive(Parser, Debug)]
#[command(author, version, about = "Dump the intermediate stages of a vein pipeline for one image")]
struct Args {
    /// Input image (jpg, png, ...)
    image: PathBuf,

    /// Pipeline preset
    #[arg(short, long, value_enum, default_value_t = Preset::Still)]
    preset: Preset,

    /// Output directory for the numbered stage images
    #[arg(short, long, default_value = "stages")]
    out: PathBuf,

    #[arg(long, value_enum)]
    polarity: Option<Polarity>,

    #[arg(long)]
    scale: Option<f32>,

    #[arg(long)]
    canny_low: Option<u8>,

    #[arg(long)]
    canny_high: Option<u8>,

    #[arg(long)]
    thickness: Option<u32>,

    #[arg(long)]
    tophat_size: Option<u32>,

    /// Also write a timestamped overlay/mask pair next to the stages
    #[arg(long)]
    snapshot: bool,
}

impl Args {
    fn parameters(&self) -> PipelineParameters {
        let base = self.preset.parameters();
        PipelineParameters {
            canny_low: self.canny_low.unwrap_or(base.canny_low),
            canny_high: self.canny_high.unwrap_or(base.canny_high),
            thickness: self.thickness.unwrap_or(base.thickness),
            tophat_size: self.tophat_size.unwrap_or(base.tophat_size),
        }
        .normalized()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = args.preset.config();
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    if let Some(polarity) = args.polarity {
        config = config.with_polarity(polarity);
    }
    let pipeline = VeinPipeline::from_config(args.preset.name(), &config);
    let params = args.parameters();

    let mut source = StillImageSource::open(args.image.clone())
        .with_context(|| format!("failed to load {}", args.image.display()))?;
    let frame = source.read_frame()?;
    let output = pipeline.process(&frame, &params);

    let written = write_stages(&args.out, &output)?;
    for path in &written {
        println!("{}", path.display());
    }

    if args.snapshot {
        let saved = SnapshotWriter::new(&args.out).save(&output.overlay, &output.mask)?;
        println!("{}", saved.overlay.display());
        println!("{}", saved.mask.display());
    }

    let lit = output.mask.pixels().filter(|p| p[0] > 0).count();
    println!(
        "{}",
        format!(
            "{}: {} stages, {} of {} pixels highlighted ({})",
            pipeline.name(),
            written.len(),
            lit,
            output.mask.width() * output.mask.height(),
            params.hud_text()
        )
        .green()
    );
    Ok(())
}
