use image::{GrayImage, Rgb};

use crate::font;
use crate::ttf::FontRenderer;
use crate::types::RgbFrame;

/// Copies `frame` and paints every nonzero mask pixel with `color`.
pub fn compose_overlay(frame: &RgbFrame, mask: &GrayImage, color: [u8; 3]) -> RgbFrame {
    let mut overlay = frame.clone();
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] > 0 && x < overlay.width() && y < overlay.height() {
            overlay.put_pixel(x, y, Rgb(color));
        }
    }
    overlay
}

/// Expands a single-channel grid to RGB for display or export.
pub fn gray_to_rgb(gray: &GrayImage) -> RgbFrame {
    RgbFrame::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// Burns status text into display copies of the overlay.
///
/// Uses a TrueType face when one was found, else the built-in bitmap font.
pub struct HudRenderer {
    font: Option<FontRenderer>,
    font_size_pt: f32,
    bitmap_scale: u32,
    color: Rgb<u8>,
}

impl HudRenderer {
    const MARGIN: u32 = 10;

    pub fn new(font: Option<FontRenderer>, font_size_pt: f32, bitmap_scale: usize, color: (u8, u8, u8)) -> Self {
        Self {
            font,
            font_size_pt,
            bitmap_scale: (bitmap_scale as u32).max(1),
            color: Rgb([color.0, color.1, color.2]),
        }
    }

    /// Bitmap font only, no filesystem lookups.
    pub fn bitmap(scale: usize) -> Self {
        Self::new(None, 12.0, scale, (255, 255, 255))
    }

    pub fn burn(&self, overlay: &RgbFrame, lines: &[String]) -> RgbFrame {
        let mut hud = overlay.clone();
        let line_height = match &self.font {
            Some(fr) => fr.line_height(self.font_size_pt) + 4,
            None => font::line_height(self.bitmap_scale),
        };
        let mut y = Self::MARGIN;
        for line in lines {
            if y >= hud.height() {
                break;
            }
            match &self.font {
                Some(fr) => fr.draw_text(&mut hud, Self::MARGIN, y, line, self.color, self.font_size_pt),
                None => font::draw_text(&mut hud, Self::MARGIN, y, line, self.color, self.bitmap_scale),
            }
            y += line_height;
        }
        hud
    }
}
