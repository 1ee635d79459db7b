//! The acquire, transform, render, poll loop.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::camera::{self, Acquisition, FrameSource, RetryPolicy, SourceId};
use crate::controls::Control;
use crate::export::{SavedSnapshot, SnapshotWriter};
use crate::output::DisplaySurface;
use crate::overlay::{gray_to_rgb, HudRenderer};
use crate::pipeline::VeinPipeline;
use crate::types::{PipelineOutput, PipelineParameters, RgbFrame};

pub const OVERLAY_WINDOW: &str = "Vein Overlay";
pub const BACKGROUND_WINDOW: &str = "Background Suppressed";
pub const EDGES_WINDOW: &str = "Edges";

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub retry: RetryPolicy,
    pub key_poll: Duration,
    pub show_intermediates: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            key_poll: Duration::from_millis(1),
            show_intermediates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

/// What a loop that ended on request leaves behind.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub frames: u64,
    pub snapshots: Vec<SavedSnapshot>,
    pub params: PipelineParameters,
}

pub struct ControlLoop<'a> {
    pipeline: &'a VeinPipeline,
    hud: &'a HudRenderer,
    writer: SnapshotWriter,
    settings: LoopSettings,
    params: PipelineParameters,
    state: LoopState,
}

impl<'a> ControlLoop<'a> {
    pub fn new(
        pipeline: &'a VeinPipeline,
        hud: &'a HudRenderer,
        writer: SnapshotWriter,
        settings: LoopSettings,
        params: PipelineParameters,
    ) -> Self {
        Self {
            pipeline,
            hud,
            writer,
            settings,
            params: params.normalized(),
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until a quit control (`Ok`) or a fatal acquisition or display
    /// error (`Err`). Either way the loop ends `Terminated`. Export
    /// failures are logged and the loop keeps going.
    pub fn run(&mut self, source: &mut dyn FrameSource, display: &mut dyn DisplaySurface) -> Result<LoopOutcome> {
        let mut acquisition = Acquisition::new(self.settings.retry);
        let mut frames = 0u64;
        let mut snapshots = Vec::new();

        info!(pipeline = self.pipeline.name(), source = %source.name(), "starting control loop");
        while self.state == LoopState::Running {
            let frame = match acquisition.next_frame(source) {
                Ok(f) => f,
                Err(e) => {
                    self.state = LoopState::Terminated;
                    return Err(e.into());
                }
            };

            let output = self.pipeline.process(&frame, &self.params);
            frames += 1;

            let hud = self.hud.burn(&output.overlay, &[self.params.hud_text()]);
            let shown = self.show_all(display, &hud, &output);
            if let Err(e) = shown {
                self.state = LoopState::Terminated;
                return Err(e);
            }

            let Some(control) = display.poll_key(self.settings.key_poll) else {
                continue;
            };
            match control {
                Control::Quit => {
                    info!(frames, "quit requested");
                    self.state = LoopState::Terminated;
                }
                Control::Save => match self.writer.save(&output.overlay, &output.mask) {
                    Ok(saved) => snapshots.push(saved),
                    Err(e) => warn!(error = %e, "snapshot not saved"),
                },
                other => {
                    self.params.apply(other);
                    debug!(?other, params = %self.params.hud_text(), "parameters changed");
                }
            }
        }

        Ok(LoopOutcome {
            frames,
            snapshots,
            params: self.params,
        })
    }

    fn show_all(
        &self,
        display: &mut dyn DisplaySurface,
        hud: &RgbFrame,
        output: &PipelineOutput,
    ) -> Result<()> {
        display.show(OVERLAY_WINDOW, hud).context("failed to show overlay")?;
        if self.settings.show_intermediates {
            for (window, stage) in [(BACKGROUND_WINDOW, "background"), (EDGES_WINDOW, "edges")] {
                if let Some(image) = output.stage(stage) {
                    display
                        .show(window, &gray_to_rgb(image))
                        .with_context(|| format!("failed to show {}", window))?;
                }
            }
        }
        Ok(())
    }
}

/// Opens `source_id` and runs `control` on it. Nothing reaches `display`
/// unless the source opens.
pub fn launch(
    source_id: &SourceId,
    display: &mut dyn DisplaySurface,
    control: &mut ControlLoop<'_>,
) -> Result<LoopOutcome> {
    let mut source = camera::open_source(source_id)?;
    info!(source = %source.name(), "opened source");
    control.run(source.as_mut(), display)
}

/// Process exit status for a finished run: 0 after a requested quit, 1
/// after any fatal error.
pub fn exit_code(result: &Result<LoopOutcome>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
