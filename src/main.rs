use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::*;
use tracing::{error, info};

mod args;

use args::Args;
use vein_overlay::app::{exit_code, launch, ControlLoop, LoopSettings};
use vein_overlay::camera::{self, SourceId};
use vein_overlay::config::{parse_hex, AppConfig};
use vein_overlay::controls::Control;
use vein_overlay::export::SnapshotWriter;
use vein_overlay::output::WindowDisplay;
use vein_overlay::overlay::HudRenderer;
use vein_overlay::pipeline::VeinPipeline;
use vein_overlay::ttf::FontRenderer;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{}", format!("Error: {:#}", e).red());
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<u8> {
    if args.list {
        let cameras = camera::list_devices().context("failed to query cameras")?;
        println!("Available Cameras:");
        println!("{:<5} | {:<30}", "Index", "Name");
        println!("{}", "-".repeat(40));
        for (index, name) in cameras {
            println!("{:<5} | {:<30}", index, name);
        }
        return Ok(0);
    }

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    let preset = args.preset.unwrap_or(config.defaults.preset);
    let mut pipeline_config = preset.config();
    if let Some(scale) = args.scale.or(config.defaults.scale) {
        pipeline_config.scale = scale;
    }
    if let Some(polarity) = args.polarity.or(config.defaults.polarity) {
        pipeline_config = pipeline_config.with_polarity(polarity);
    }
    let (r, g, b) = parse_hex(&config.ui.highlight_color_hex);
    pipeline_config.highlight = [r, g, b];
    let pipeline = VeinPipeline::from_config(preset.name(), &pipeline_config);
    info!(preset = preset.name(), stages = ?pipeline.stage_names(), "pipeline ready");

    let source_id = SourceId::parse(args.source.as_deref().unwrap_or(&config.defaults.source));
    println!("Source: {}", source_id.to_string().green());
    println!("Preset: {}", preset.name().cyan());
    println!("{}", Control::HELP.yellow());

    let font = FontRenderer::try_load(&config.ui.font_family);
    let hud = HudRenderer::new(
        font,
        config.ui.font_size_pt as f32,
        config.ui.menu_scale,
        parse_hex(&config.ui.hud_color_hex),
    );

    let mut retry = config.capture.retry_policy();
    if let Some(max) = args.max_read_failures {
        retry.max_consecutive_failures = max.max(1);
    }
    let settings = LoopSettings {
        retry,
        key_poll: Duration::from_millis(config.capture.key_poll_ms),
        show_intermediates: config.ui.show_intermediates && !args.no_intermediates,
    };
    let writer = SnapshotWriter::new(args.save_dir.unwrap_or_else(|| config.export.save_dir.clone()));
    info!(dir = %writer.dir().display(), "snapshots will be saved here");

    let mut display = WindowDisplay::new();
    let mut control = ControlLoop::new(
        &pipeline,
        &hud,
        writer,
        settings,
        config.initial_parameters(preset),
    );
    // Windows open lazily, so a source that never opens shows nothing.
    let result = launch(&source_id, &mut display, &mut control);
    if let Err(e) = &result {
        error!("{:#}", e);
        eprintln!("{}", format!("Error: {:#}", e).red());
    } else {
        println!("Exiting.");
    }
    Ok(exit_code(&result))
}
