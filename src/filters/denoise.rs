use image::{GrayImage, Luma};

/// Non-local means for grayscale images.
///
/// Each pixel becomes a weighted mean over a `(2s+1)^2` search window, with
/// weights from the squared distance between `(2p+1)^2` patches. `h` plays
/// the same role as the filter strength in common NLM implementations:
/// larger values smooth more.
pub fn non_local_means(src: &GrayImage, h: f32, patch_radius: u32, search_radius: u32) -> GrayImage {
    let (w, ht) = src.dimensions();
    if w == 0 || ht == 0 || h <= 0.0 {
        return src.clone();
    }
    let p = patch_radius as i64;
    let s = search_radius as i64;
    let patch_area = ((2 * p + 1) * (2 * p + 1)) as f32;
    let h2 = h * h;

    let at = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, ht as i64 - 1) as u32;
        src.get_pixel(cx, cy)[0] as f32
    };

    GrayImage::from_fn(w, ht, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut weight_sum = 0.0f32;
        let mut acc = 0.0f32;
        for qy in (y - s)..=(y + s) {
            if qy < 0 || qy >= ht as i64 {
                continue;
            }
            for qx in (x - s)..=(x + s) {
                if qx < 0 || qx >= w as i64 {
                    continue;
                }
                let mut dist = 0.0f32;
                for dy in -p..=p {
                    for dx in -p..=p {
                        let d = at(x + dx, y + dy) - at(qx + dx, qy + dy);
                        dist += d * d;
                    }
                }
                let weight = (-(dist / patch_area) / h2).exp();
                weight_sum += weight;
                acc += weight * at(qx, qy);
            }
        }
        Luma([(acc / weight_sum).round().clamp(0.0, 255.0) as u8])
    })
}
