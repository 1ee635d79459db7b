use std::fs;
use std::path::PathBuf;

use image::Rgb;
use rusttype::{point, Font, Scale};
use tracing::{debug, info};

use crate::types::RgbFrame;

const FONT_DIRS: [&str; 6] = [
    "/Library/Fonts",
    "/System/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "/usr/share/fonts/truetype",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
];

/// Anti-aliased HUD text from a TrueType face.
pub struct FontRenderer {
    font: Font<'static>,
}

impl FontRenderer {
    /// Looks for `<family>.ttf` in the usual macOS/Linux font folders, then
    /// the working directory.
    pub fn try_load(family: &str) -> Option<Self> {
        let file = format!("{}.ttf", family);
        let candidates = FONT_DIRS
            .iter()
            .map(|dir| PathBuf::from(dir).join(&file))
            .chain(std::iter::once(PathBuf::from(&file)));

        for path in candidates {
            let Ok(data) = fs::read(&path) else {
                continue;
            };
            if let Some(font) = Font::try_from_vec(data) {
                info!(path = %path.display(), "loaded HUD font");
                return Some(Self { font });
            }
        }

        debug!(family, "font family not found, using bitmap HUD font");
        None
    }

    /// Draws one line with its top edge at `y`, blending glyph coverage
    /// into the existing pixels.
    pub fn draw_text(&self, img: &mut RgbFrame, x: u32, y: u32, text: &str, color: Rgb<u8>, size_pt: f32) {
        let scale = Scale::uniform(size_pt);
        let ascent = self.font.v_metrics(scale).ascent;
        let start = point(x as f32, y as f32 + ascent);
        let (w, h) = img.dimensions();

        for glyph in self.font.layout(text, scale, start) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 || px as u32 >= w || py as u32 >= h {
                    return;
                }
                let dst = img.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    let blended = dst[c] as f32 * (1.0 - coverage) + color[c] as f32 * coverage;
                    dst[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            });
        }
    }

    pub fn line_height(&self, size_pt: f32) -> u32 {
        let v = self.font.v_metrics(Scale::uniform(size_pt));
        (v.ascent - v.descent + v.line_gap).ceil().max(1.0) as u32
    }
}
