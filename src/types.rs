use image::{GrayImage, ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

/// One color frame as delivered by a source.
pub type RgbFrame = ImageBuffer<Rgb<u8>, Vec<u8>>;

pub const CANNY_LOW_MAX: u8 = 100;
pub const CANNY_HIGH_MAX: u8 = 250;
/// Minimum distance kept between the high and low Canny thresholds.
pub const CANNY_GAP: u8 = 10;
pub const THICKNESS_MIN: u32 = 1;
pub const THICKNESS_MAX: u32 = 7;
pub const TOPHAT_MIN: u32 = 7;
pub const TOPHAT_MAX: u32 = 31;

/// Tunables mutated by the live controls and read by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParameters {
    pub canny_low: u8,
    pub canny_high: u8,
    /// Side of the square dilation box applied to surviving structure.
    pub thickness: u32,
    /// Side of the background-suppression structuring element.
    pub tophat_size: u32,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            canny_low: 30,
            canny_high: 100,
            thickness: 2,
            tophat_size: 15,
        }
    }
}

impl PipelineParameters {
    /// Brings every field back inside its policy range.
    pub fn normalized(self) -> Self {
        let canny_low = self.canny_low.min(CANNY_LOW_MAX);
        Self {
            canny_low,
            canny_high: self.canny_high.clamp(canny_low + CANNY_GAP, CANNY_HIGH_MAX),
            thickness: self.thickness.clamp(THICKNESS_MIN, THICKNESS_MAX),
            tophat_size: self.tophat_size.clamp(TOPHAT_MIN, TOPHAT_MAX),
        }
    }

    /// Thresholds as handed to the edge detector, with the gap enforced.
    pub fn canny_thresholds(&self) -> (f32, f32) {
        let high = self.canny_high.max(self.canny_low.saturating_add(CANNY_GAP));
        (self.canny_low as f32, high as f32)
    }

    pub fn effective_thickness(&self) -> u32 {
        self.thickness.clamp(THICKNESS_MIN, THICKNESS_MAX)
    }

    /// Structuring element side used for background suppression, always odd.
    pub fn effective_tophat_size(&self) -> u32 {
        odd(self.tophat_size.clamp(TOPHAT_MIN, TOPHAT_MAX))
    }

    /// One-line summary burned into the HUD.
    pub fn hud_text(&self) -> String {
        format!(
            "LO/HI:{}/{} | THICK:{} | TOPHAT:{}",
            self.canny_low, self.canny_high, self.thickness, self.tophat_size
        )
    }
}

/// Rounds even sizes up to the next odd value.
pub fn odd(n: u32) -> u32 {
    if n % 2 == 1 {
        n
    } else {
        n + 1
    }
}

/// A named intermediate grid kept for display and stage dumps.
#[derive(Debug, Clone)]
pub struct StageImage {
    pub name: &'static str,
    pub image: GrayImage,
}

/// Everything one transform pass produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The frame the mask was computed on (after optional downscale).
    pub frame: RgbFrame,
    /// Binary vessel mask, 0 or 255.
    pub mask: GrayImage,
    /// `frame` with every mask pixel set to the highlight color.
    pub overlay: RgbFrame,
    /// Intermediate grids in stage order.
    pub stages: Vec<StageImage>,
}

impl PipelineOutput {
    pub fn stage(&self, name: &str) -> Option<&GrayImage> {
        self.stages.iter().find(|s| s.name == name).map(|s| &s.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_rounds_up() {
        assert_eq!(odd(14), 15);
        assert_eq!(odd(15), 15);
        assert_eq!(odd(0), 1);
    }

    #[test]
    fn effective_values_are_clamped() {
        let p = PipelineParameters {
            canny_low: 95,
            canny_high: 90,
            thickness: 0,
            tophat_size: 40,
        };
        assert_eq!(p.canny_thresholds(), (95.0, 105.0));
        assert_eq!(p.effective_thickness(), 1);
        assert_eq!(p.effective_tophat_size(), 31);

        let even = PipelineParameters { tophat_size: 8, ..Default::default() };
        assert_eq!(even.effective_tophat_size(), 9);
    }

    #[test]
    fn normalized_restores_gap() {
        let p = PipelineParameters {
            canny_low: 120,
            canny_high: 5,
            thickness: 9,
            tophat_size: 3,
        }
        .normalized();
        assert_eq!(p.canny_low, 100);
        assert_eq!(p.canny_high, 110);
        assert_eq!(p.thickness, 7);
        assert_eq!(p.tophat_size, 7);
    }
}
