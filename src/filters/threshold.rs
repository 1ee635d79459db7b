use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};

/// Sigma a `ksize`-tap Gaussian kernel gets when none is given.
pub fn kernel_sigma(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Binary threshold against a Gaussian-weighted local mean:
/// `255` where `src > mean - offset`, `0` elsewhere.
pub fn adaptive_gaussian(src: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let mean = gaussian_blur_f32(src, kernel_sigma(block_size.max(3)));
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        let v = src.get_pixel(x, y)[0] as f32;
        let m = mean.get_pixel(x, y)[0] as f32;
        Luma([if v > m - offset { 255 } else { 0 }])
    })
}

/// Edges from a half-resolution pass and a full-resolution pass, averaged,
/// then median-filtered. Output is binary.
pub fn multi_scale_canny(
    src: &GrayImage,
    global: (f32, f32),
    local: (f32, f32),
    median_radius: u32,
) -> GrayImage {
    let (w, h) = src.dimensions();
    let local_edges = canny(src, local.0, local.1);
    let global_edges = if w >= 4 && h >= 4 {
        let small = imageops::resize(src, w / 2, h / 2, FilterType::Triangle);
        let edges = canny(&small, global.0, global.1);
        imageops::resize(&edges, w, h, FilterType::Triangle)
    } else {
        local_edges.clone()
    };

    let combined = GrayImage::from_fn(w, h, |x, y| {
        let g = global_edges.get_pixel(x, y)[0] as u16;
        let l = local_edges.get_pixel(x, y)[0] as u16;
        Luma([((g + l) / 2) as u8])
    });
    let filtered = if median_radius > 0 {
        median_filter(&combined, median_radius, median_radius)
    } else {
        combined
    };
    super::morph::binarize(&filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_matches_common_default() {
        assert!((kernel_sigma(5) - 1.1).abs() < 1e-6);
        assert!((kernel_sigma(15) - 2.6).abs() < 1e-5);
    }

    #[test]
    fn adaptive_threshold_marks_locally_bright_pixels() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([100]));
        img.put_pixel(10, 10, Luma([20]));
        let out = adaptive_gaussian(&img, 15, 2.0);
        assert_eq!(out.get_pixel(10, 10)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn multi_scale_finds_a_strong_step() {
        let img = GrayImage::from_fn(64, 48, |x, _| Luma([if x < 32 { 30 } else { 220 }]));
        let edges = multi_scale_canny(&img, (50.0, 150.0), (100.0, 200.0), 0);
        let near_step = (0..48).any(|y| (29..35).any(|x| edges.get_pixel(x, y)[0] == 255));
        assert!(near_step);
        assert_eq!(edges.get_pixel(5, 20)[0], 0);
    }
}
