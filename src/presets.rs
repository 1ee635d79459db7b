//! Named pipeline variants selectable from the command line or config.

use serde::{Deserialize, Serialize};

use crate::pipeline::{
    Background, Contrast, Denoise, Edges, PipelineConfig, Polarity, Speckle, VeinPipeline,
};
use crate::types::PipelineParameters;

/// Red, the highlight all variants share.
pub const HIGHLIGHT: [u8; 3] = [255, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Bilateral denoise, CLAHE, black-hat, Canny, opening, dilation. Tuned
    /// for a live webcam feed at 0.8x.
    #[default]
    Live,
    /// Same chain at full resolution with non-local means denoising.
    Still,
    /// Frangi vesselness blended with top-hat, adaptive threshold and
    /// skeletonization.
    Vessel,
    /// Sharpened CLAHE with edges from two scales and a median cleanup.
    Multiscale,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Live => "live",
            Preset::Still => "still",
            Preset::Vessel => "vessel",
            Preset::Multiscale => "multiscale",
        }
    }

    pub fn config(&self) -> PipelineConfig {
        match self {
            Preset::Live => PipelineConfig {
                scale: 0.8,
                denoise: Denoise::Bilateral {
                    window: 5,
                    sigma_color: 60.0,
                    sigma_spatial: 60.0,
                },
                contrast: Contrast::Clahe {
                    clip_limit: 3.0,
                    tiles: (8, 8),
                    sharpen: false,
                },
                background: Background::TopHat {
                    polarity: Polarity::Dark,
                },
                edges: Edges::Canny,
                speckle: Speckle::Lines,
                skeletonize: false,
                highlight: HIGHLIGHT,
            },
            Preset::Still => PipelineConfig {
                scale: 1.0,
                denoise: Denoise::NonLocalMeans {
                    h: 30.0,
                    patch_radius: 1,
                    search_radius: 5,
                },
                ..Preset::Live.config()
            },
            Preset::Vessel => PipelineConfig {
                scale: 1.0,
                denoise: Denoise::NonLocalMeans {
                    h: 30.0,
                    patch_radius: 1,
                    search_radius: 5,
                },
                contrast: Contrast::Clahe {
                    clip_limit: 3.0,
                    tiles: (8, 8),
                    sharpen: false,
                },
                background: Background::Blend {
                    sigmas: vec![1.0, 3.0, 5.0, 7.0, 9.0],
                    beta: 0.5,
                    frangi_weight: 0.6,
                    frangi_polarity: Polarity::Dark,
                    tophat_polarity: Polarity::Bright,
                },
                edges: Edges::AdaptiveThreshold {
                    block_size: 15,
                    offset: 2.0,
                },
                speckle: Speckle::None,
                skeletonize: true,
                highlight: HIGHLIGHT,
            },
            Preset::Multiscale => PipelineConfig {
                scale: 1.0,
                denoise: Denoise::Gaussian { sigma: 1.1 },
                contrast: Contrast::Clahe {
                    clip_limit: 2.0,
                    tiles: (8, 8),
                    sharpen: true,
                },
                background: Background::None,
                edges: Edges::MultiScaleCanny {
                    global: (50.0, 150.0),
                    median_radius: 3,
                },
                speckle: Speckle::None,
                skeletonize: false,
                highlight: HIGHLIGHT,
            },
        }
    }

    /// Starting values for the live controls.
    pub fn parameters(&self) -> PipelineParameters {
        match self {
            Preset::Live | Preset::Still => PipelineParameters::default(),
            Preset::Vessel => PipelineParameters {
                thickness: 1,
                ..PipelineParameters::default()
            },
            Preset::Multiscale => PipelineParameters {
                canny_low: 100,
                canny_high: 200,
                thickness: 1,
                ..PipelineParameters::default()
            },
        }
    }

    pub fn pipeline(&self) -> VeinPipeline {
        VeinPipeline::from_config(self.name(), &self.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_parameters_are_normalized() {
        for preset in [Preset::Live, Preset::Still, Preset::Vessel, Preset::Multiscale] {
            let p = preset.parameters();
            assert_eq!(p, p.normalized(), "{}", preset.name());
        }
    }

    #[test]
    fn configs_round_trip_through_json() {
        let config = Preset::Vessel.config();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"kind\":\"blend\""));
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn camera_presets_look_for_dark_vessels() {
        for preset in [Preset::Live, Preset::Still] {
            assert_eq!(
                preset.config().background,
                Background::TopHat {
                    polarity: Polarity::Dark
                },
                "{}",
                preset.name()
            );
        }
    }

    #[test]
    fn vessel_blend_mixes_dark_ridges_with_white_top_hat() {
        match Preset::Vessel.config().background {
            Background::Blend {
                frangi_polarity,
                tophat_polarity,
                frangi_weight,
                ..
            } => {
                assert_eq!(frangi_polarity, Polarity::Dark);
                assert_eq!(tophat_polarity, Polarity::Bright);
                assert_eq!(frangi_weight, 0.6);
            }
            other => panic!("unexpected background {other:?}"),
        }
    }
}
