use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32, sharpen3x3};
use serde::{Deserialize, Serialize};

use crate::filters::{denoise, morph, skeleton, threshold, Clahe, Frangi};
use crate::overlay::compose_overlay;
use crate::types::{PipelineOutput, PipelineParameters, RgbFrame, StageImage};

/// One replaceable step of the transform. Stages see only the previous
/// stage's output and the current parameters, and must not keep state.
pub trait Stage {
    /// Name the output is recorded under.
    fn name(&self) -> &'static str;
    fn apply(&self, input: &GrayImage, params: &PipelineParameters) -> GrayImage;
}

/// Which thin structures background suppression keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Brighter than the surroundings (white top-hat).
    Bright,
    /// Darker than the surroundings (black-hat). Veins under visible light.
    #[default]
    Dark,
}

fn bright() -> Polarity {
    Polarity::Bright
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denoise {
    None,
    Bilateral {
        window: u32,
        sigma_color: f32,
        sigma_spatial: f32,
    },
    Gaussian {
        sigma: f32,
    },
    NonLocalMeans {
        h: f32,
        patch_radius: u32,
        search_radius: u32,
    },
}

impl Stage for Denoise {
    fn name(&self) -> &'static str {
        "denoised"
    }

    fn apply(&self, input: &GrayImage, _params: &PipelineParameters) -> GrayImage {
        match *self {
            Denoise::None => input.clone(),
            Denoise::Bilateral {
                window,
                sigma_color,
                sigma_spatial,
            } => bilateral_filter(input, window, sigma_color, sigma_spatial),
            Denoise::Gaussian { sigma } => gaussian_blur_f32(input, sigma),
            Denoise::NonLocalMeans {
                h,
                patch_radius,
                search_radius,
            } => denoise::non_local_means(input, h, patch_radius, search_radius),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contrast {
    None,
    Clahe {
        clip_limit: f32,
        tiles: (u32, u32),
        /// Follow equalization with a 3x3 Laplacian sharpen.
        #[serde(default)]
        sharpen: bool,
    },
}

impl Stage for Contrast {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn apply(&self, input: &GrayImage, _params: &PipelineParameters) -> GrayImage {
        match *self {
            Contrast::None => input.clone(),
            Contrast::Clahe {
                clip_limit,
                tiles,
                sharpen,
            } => {
                let equalized = Clahe::new(clip_limit, tiles).apply(input);
                if sharpen {
                    sharpen3x3(&equalized)
                } else {
                    equalized
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Background {
    None,
    /// Morphological residual with a square element of side `tophat_size`.
    TopHat { polarity: Polarity },
    Frangi {
        sigmas: Vec<f32>,
        beta: f32,
        polarity: Polarity,
    },
    /// `frangi_weight * frangi + (1 - frangi_weight) * top-hat`. The two
    /// halves carry their own polarity.
    Blend {
        sigmas: Vec<f32>,
        beta: f32,
        frangi_weight: f32,
        #[serde(default)]
        frangi_polarity: Polarity,
        #[serde(default = "bright")]
        tophat_polarity: Polarity,
    },
}

fn residual(input: &GrayImage, polarity: Polarity, size: u32) -> GrayImage {
    match polarity {
        Polarity::Bright => morph::top_hat(input, size),
        Polarity::Dark => morph::black_hat(input, size),
    }
}

fn vesselness(input: &GrayImage, sigmas: &[f32], beta: f32, polarity: Polarity) -> GrayImage {
    Frangi {
        sigmas: sigmas.to_vec(),
        beta,
        black_ridges: polarity == Polarity::Dark,
    }
    .apply(input)
}

impl Stage for Background {
    fn name(&self) -> &'static str {
        "background"
    }

    fn apply(&self, input: &GrayImage, params: &PipelineParameters) -> GrayImage {
        let size = params.effective_tophat_size();
        match self {
            Background::None => input.clone(),
            Background::TopHat { polarity } => residual(input, *polarity, size),
            Background::Frangi {
                sigmas,
                beta,
                polarity,
            } => vesselness(input, sigmas, *beta, *polarity),
            Background::Blend {
                sigmas,
                beta,
                frangi_weight,
                frangi_polarity,
                tophat_polarity,
            } => {
                let vessels = vesselness(input, sigmas, *beta, *frangi_polarity);
                let hat = residual(input, *tophat_polarity, size);
                let wf = frangi_weight.clamp(0.0, 1.0);
                GrayImage::from_fn(input.width(), input.height(), |x, y| {
                    let v = wf * vessels.get_pixel(x, y)[0] as f32
                        + (1.0 - wf) * hat.get_pixel(x, y)[0] as f32;
                    Luma([v.round().clamp(0.0, 255.0) as u8])
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edges {
    /// Double-threshold edges with the live thresholds.
    Canny,
    /// Half-scale edges at fixed `global` thresholds averaged with
    /// full-scale edges at the live thresholds.
    MultiScaleCanny {
        global: (f32, f32),
        median_radius: u32,
    },
    AdaptiveThreshold { block_size: u32, offset: f32 },
}

impl Stage for Edges {
    fn name(&self) -> &'static str {
        "edges"
    }

    fn apply(&self, input: &GrayImage, params: &PipelineParameters) -> GrayImage {
        let (low, high) = params.canny_thresholds();
        match *self {
            Edges::Canny => canny(input, low, high),
            Edges::MultiScaleCanny {
                global,
                median_radius,
            } => threshold::multi_scale_canny(input, global, (low, high), median_radius),
            Edges::AdaptiveThreshold { block_size, offset } => {
                threshold::adaptive_gaussian(input, block_size, offset)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speckle {
    None,
    /// 3x3 square opening.
    Square,
    /// Union of 3-pixel line openings; keeps one-pixel curves.
    Lines,
}

impl Stage for Speckle {
    fn name(&self) -> &'static str {
        "cleaned"
    }

    fn apply(&self, input: &GrayImage, _params: &PipelineParameters) -> GrayImage {
        match self {
            Speckle::None => morph::binarize(input),
            Speckle::Square => morph::open_square3(input),
            Speckle::Lines => morph::open_lines3(input),
        }
    }
}

pub struct Thinning;

impl Stage for Thinning {
    fn name(&self) -> &'static str {
        "thinned"
    }

    fn apply(&self, input: &GrayImage, _params: &PipelineParameters) -> GrayImage {
        skeleton::skeletonize(input)
    }
}

/// Final dilation by a `thickness x thickness` box.
pub struct Thicken;

impl Stage for Thicken {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn apply(&self, input: &GrayImage, params: &PipelineParameters) -> GrayImage {
        let t = params.effective_thickness();
        morph::binarize(&morph::dilate_rect(input, t, t))
    }
}

/// Serializable description of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Downscale factor applied before anything else; 1.0 keeps native size.
    pub scale: f32,
    pub denoise: Denoise,
    pub contrast: Contrast,
    pub background: Background,
    pub edges: Edges,
    pub speckle: Speckle,
    #[serde(default)]
    pub skeletonize: bool,
    /// RGB color written over mask pixels.
    pub highlight: [u8; 3],
}

impl PipelineConfig {
    /// Overrides the morphological residual's polarity. A pure Frangi
    /// background takes it too; in a blend the Frangi half keeps its own.
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        match &mut self.background {
            Background::TopHat { polarity: p }
            | Background::Frangi { polarity: p, .. }
            | Background::Blend {
                tophat_polarity: p, ..
            } => *p = polarity,
            Background::None => {}
        }
        self
    }
}

/// The fixed stage order: gray, denoise, contrast, background, edges,
/// speckle cleanup, optional thinning, thickening.
pub struct VeinPipeline {
    name: String,
    scale: f32,
    highlight: [u8; 3],
    stages: Vec<Box<dyn Stage>>,
}

impl VeinPipeline {
    /// An empty pipeline; add stages with [`VeinPipeline::with_stage`].
    pub fn new(name: impl Into<String>, scale: f32, highlight: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            scale,
            highlight,
            stages: Vec::new(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &PipelineConfig) -> Self {
        let mut pipeline = Self::new(name, config.scale, config.highlight)
            .with_stage(Box::new(config.denoise.clone()))
            .with_stage(Box::new(config.contrast.clone()))
            .with_stage(Box::new(config.background.clone()))
            .with_stage(Box::new(config.edges.clone()))
            .with_stage(Box::new(config.speckle));
        if config.skeletonize {
            pipeline = pipeline.with_stage(Box::new(Thinning));
        }
        pipeline.with_stage(Box::new(Thicken))
    }

    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Downscales by the configured factor with linear interpolation.
    pub fn prepare(&self, frame: &RgbFrame) -> RgbFrame {
        let (w, h) = frame.dimensions();
        if self.scale <= 0.0 || (self.scale - 1.0).abs() < f32::EPSILON || w == 0 || h == 0 {
            return frame.clone();
        }
        let nw = ((w as f32 * self.scale).round() as u32).max(1);
        let nh = ((h as f32 * self.scale).round() as u32).max(1);
        imageops::resize(frame, nw, nh, FilterType::Triangle)
    }

    /// Runs every stage on one frame. Deterministic in `(frame, params)`.
    pub fn process(&self, frame: &RgbFrame, params: &PipelineParameters) -> PipelineOutput {
        let frame = self.prepare(frame);
        let gray = imageops::grayscale(&frame);

        let mut stages = vec![StageImage {
            name: "gray",
            image: gray.clone(),
        }];
        let mut current = gray;
        for stage in &self.stages {
            current = stage.apply(&current, params);
            stages.push(StageImage {
                name: stage.name(),
                image: current.clone(),
            });
        }

        let mask = morph::binarize(&current);
        let overlay = compose_overlay(&frame, &mask, self.highlight);
        PipelineOutput {
            frame,
            mask,
            overlay,
            stages,
        }
    }
}
