use image::{GrayImage, Luma};

/// Zhang-Suen thinning of a binary mask (nonzero is foreground).
pub fn skeletonize(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let mut grid: Vec<bool> = mask.pixels().map(|p| p[0] > 0).collect();
    let get = |g: &[bool], x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < wi && y < hi && g[(y * wi + x) as usize]
    };

    loop {
        let mut changed = false;
        for pass in 0..2 {
            let mut remove = Vec::new();
            for y in 0..hi {
                for x in 0..wi {
                    if !get(&grid, x, y) {
                        continue;
                    }
                    // P2..P9, clockwise from north.
                    let n = [
                        get(&grid, x, y - 1),
                        get(&grid, x + 1, y - 1),
                        get(&grid, x + 1, y),
                        get(&grid, x + 1, y + 1),
                        get(&grid, x, y + 1),
                        get(&grid, x - 1, y + 1),
                        get(&grid, x - 1, y),
                        get(&grid, x - 1, y - 1),
                    ];
                    let b = n.iter().filter(|v| **v).count();
                    if !(2..=6).contains(&b) {
                        continue;
                    }
                    let a = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
                    if a != 1 {
                        continue;
                    }
                    let (p2, p4, p6, p8) = (n[0], n[2], n[4], n[6]);
                    let ok = if pass == 0 {
                        !(p2 && p4 && p6) && !(p4 && p6 && p8)
                    } else {
                        !(p2 && p4 && p8) && !(p2 && p6 && p8)
                    };
                    if ok {
                        remove.push((y * wi + x) as usize);
                    }
                }
            }
            if !remove.is_empty() {
                changed = true;
                for i in remove {
                    grid[i] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        Luma([if grid[(y * w + x) as usize] { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thick_bar_thins_to_single_line() {
        let mut img = GrayImage::new(30, 15);
        for y in 5..10 {
            for x in 3..27 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let skel = skeletonize(&img);
        for x in 6..24 {
            let column: u32 = (0..15).filter(|&y| skel.get_pixel(x, y)[0] > 0).count() as u32;
            assert_eq!(column, 1, "column {x}");
        }
        assert!(skel.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn empty_mask_stays_empty() {
        let img = GrayImage::new(10, 10);
        assert_eq!(skeletonize(&img), img);
    }
}
