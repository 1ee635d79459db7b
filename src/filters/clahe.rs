//! Contrast-limited adaptive histogram equalization.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clahe {
    /// Histogram bins are clipped at `clip_limit * tile_area / 256`.
    pub clip_limit: f32,
    /// Tiles across and down.
    pub tiles: (u32, u32),
}

impl Default for Clahe {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tiles: (8, 8),
        }
    }
}

impl Clahe {
    pub fn new(clip_limit: f32, tiles: (u32, u32)) -> Self {
        Self { clip_limit, tiles }
    }

    pub fn apply(&self, src: &GrayImage) -> GrayImage {
        let (w, h) = src.dimensions();
        if w == 0 || h == 0 {
            return src.clone();
        }
        let gx = self.tiles.0.clamp(1, w);
        let gy = self.tiles.1.clamp(1, h);
        let tw = w.div_ceil(gx);
        let th = h.div_ceil(gy);

        let mut luts = vec![[0u8; 256]; (gx * gy) as usize];
        for ty in 0..gy {
            for tx in 0..gx {
                let x0 = tx * tw;
                let y0 = ty * th;
                let x1 = (x0 + tw).min(w);
                let y1 = (y0 + th).min(h);
                luts[(ty * gx + tx) as usize] = self.tile_lut(src, x0, y0, x1, y1);
            }
        }

        let inv_tw = 1.0 / tw as f32;
        let inv_th = 1.0 / th as f32;
        GrayImage::from_fn(w, h, |x, y| {
            let v = src.get_pixel(x, y)[0] as usize;

            let tyf = y as f32 * inv_th - 0.5;
            let ty1 = tyf.floor() as i64;
            let ya = tyf - ty1 as f32;
            let ty2 = (ty1 + 1).min(gy as i64 - 1) as u32;
            let ty1 = ty1.max(0) as u32;

            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let tx2 = (tx1 + 1).min(gx as i64 - 1) as u32;
            let tx1 = tx1.max(0) as u32;

            let at = |tx: u32, ty: u32| luts[(ty * gx + tx) as usize][v] as f32;
            let top = at(tx1, ty1) * (1.0 - xa) + at(tx2, ty1) * xa;
            let bottom = at(tx1, ty2) * (1.0 - xa) + at(tx2, ty2) * xa;
            let out = top * (1.0 - ya) + bottom * ya;
            Luma([out.round().clamp(0.0, 255.0) as u8])
        })
    }

    fn tile_lut(&self, src: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [u8; 256] {
        let mut lut = [0u8; 256];
        let area = ((x1.saturating_sub(x0)) * (y1.saturating_sub(y0))) as usize;
        if area == 0 {
            return lut;
        }

        let mut hist = [0usize; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                hist[src.get_pixel(x, y)[0] as usize] += 1;
            }
        }

        if self.clip_limit > 0.0 {
            let clip = ((self.clip_limit * area as f32 / 256.0) as usize).max(1);
            let mut excess = 0usize;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let redistributed = excess / 256;
            let mut residual = excess - redistributed * 256;
            for bin in hist.iter_mut() {
                *bin += redistributed;
            }
            if residual > 0 {
                let step = (256 / residual).max(1);
                let mut i = 0;
                while i < 256 && residual > 0 {
                    hist[i] += 1;
                    residual -= 1;
                    i += step;
                }
            }
        }

        let scale = 255.0 / area as f32;
        let mut sum = 0usize;
        for (i, bin) in hist.iter().enumerate() {
            sum += bin;
            lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
        lut
    }
}
