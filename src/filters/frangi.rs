//! Multi-scale Hessian vesselness (Frangi et al. 1998) for 2D images.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frangi {
    pub sigmas: Vec<f32>,
    /// Sensitivity to blob-like versus line-like structure.
    pub beta: f32,
    /// Respond to dark ridges on a bright background.
    pub black_ridges: bool,
}

impl Default for Frangi {
    fn default() -> Self {
        Self {
            sigmas: vec![1.0, 3.0, 5.0, 7.0, 9.0],
            beta: 0.5,
            black_ridges: true,
        }
    }
}

impl Frangi {
    /// Vesselness in `[0, 1]`, maximized over scales.
    pub fn response(&self, src: &GrayImage) -> Vec<f32> {
        let (w, h) = src.dimensions();
        let n = (w * h) as usize;
        let mut best = vec![0.0f32; n];
        if n == 0 {
            return best;
        }
        let unit = FloatImage::from_fn(w, h, |x, y| Luma([src.get_pixel(x, y)[0] as f32 / 255.0]));

        for &sigma in &self.sigmas {
            let smoothed = if sigma > 0.0 {
                gaussian_blur_f32(&unit, sigma)
            } else {
                unit.clone()
            };
            let (hxx, hxy, hyy) = hessian(&smoothed);
            let s2 = sigma * sigma;

            let mut l1 = vec![0.0f32; n];
            let mut l2 = vec![0.0f32; n];
            let mut max_norm = 0.0f32;
            for i in 0..n {
                let (a, b) = eigenvalues(hxx[i] * s2, hxy[i] * s2, hyy[i] * s2);
                l1[i] = a;
                l2[i] = b;
                max_norm = max_norm.max((a * a + b * b).sqrt());
            }
            let gamma = max_norm / 2.0;
            if gamma <= f32::EPSILON {
                continue;
            }

            for i in 0..n {
                let (a, b) = (l1[i], l2[i]);
                let wrong_polarity = if self.black_ridges { b < 0.0 } else { b > 0.0 };
                if wrong_polarity || b == 0.0 {
                    continue;
                }
                let rb = a / b;
                let s = a * a + b * b;
                let v = (-(rb * rb) / (2.0 * self.beta * self.beta)).exp()
                    * (1.0 - (-s / (2.0 * gamma * gamma)).exp());
                if v > best[i] {
                    best[i] = v;
                }
            }
        }
        best
    }

    /// Vesselness scaled to `0..=255`.
    pub fn apply(&self, src: &GrayImage) -> GrayImage {
        let response = self.response(src);
        GrayImage::from_fn(src.width(), src.height(), |x, y| {
            let v = response[(y * src.width() + x) as usize];
            Luma([(v * 255.0).clamp(0.0, 255.0) as u8])
        })
    }
}

/// Second derivatives by central differences.
fn hessian(img: &FloatImage) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let (w, h) = img.dimensions();
    let n = (w * h) as usize;
    let at = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        img.get_pixel(cx, cy)[0]
    };
    let mut hxx = vec![0.0; n];
    let mut hxy = vec![0.0; n];
    let mut hyy = vec![0.0; n];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let i = (y * w as i64 + x) as usize;
            let c = at(x, y);
            hxx[i] = at(x + 1, y) - 2.0 * c + at(x - 1, y);
            hyy[i] = at(x, y + 1) - 2.0 * c + at(x, y - 1);
            hxy[i] = (at(x + 1, y + 1) - at(x + 1, y - 1) - at(x - 1, y + 1) + at(x - 1, y - 1)) / 4.0;
        }
    }
    (hxx, hxy, hyy)
}

/// Eigenvalues of a symmetric 2x2 matrix ordered by magnitude, smallest first.
fn eigenvalues(xx: f32, xy: f32, yy: f32) -> (f32, f32) {
    let half_trace = (xx + yy) / 2.0;
    let disc = (((xx - yy) / 2.0).powi(2) + xy * xy).sqrt();
    let (a, b) = (half_trace - disc, half_trace + disc);
    if a.abs() <= b.abs() {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_line() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, _| Luma([if (19..=21).contains(&x) { 60 } else { 200 }]))
    }

    #[test]
    fn dark_ridge_outscores_background() {
        let f = Frangi {
            sigmas: vec![1.0, 2.0],
            ..Frangi::default()
        };
        let r = f.response(&dark_line());
        let on = r[(20 * 40 + 20) as usize];
        let off = r[(20 * 40 + 5) as usize];
        assert!(on > 0.2, "on-ridge {on}");
        assert!(off < 0.01, "background {off}");
    }

    #[test]
    fn polarity_is_respected() {
        let f = Frangi {
            sigmas: vec![1.0, 2.0],
            black_ridges: false,
            ..Frangi::default()
        };
        let r = f.response(&dark_line());
        assert!(r[(20 * 40 + 20) as usize] < 0.01);
    }

    #[test]
    fn eigenvalues_sorted_by_magnitude() {
        let (a, b) = eigenvalues(-3.0, 0.0, 1.0);
        assert_eq!((a, b), (1.0, -3.0));
    }
}
