//! Morphology helpers on top of `imageproc::morphology`.
//!
//! Rectangular windows of side `k` are anchored at `k/2`, so the window
//! spans `[x - k/2, x - k/2 + k - 1]` and even sides lean towards the
//! origin. Pixels outside the image are ignored rather than padded.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{grayscale_close, grayscale_dilate, grayscale_open, Mask};

/// Largest side a mask may have.
const MAX_SIDE: u32 = 511;

/// A filled `kw x kh` box anchored at `(kw/2, kh/2)`.
pub fn rect_mask(kw: u32, kh: u32) -> Mask {
    let kw = kw.clamp(1, MAX_SIDE);
    let kh = kh.clamp(1, MAX_SIDE);
    let block = GrayImage::from_pixel(kw, kh, Luma([255]));
    Mask::from_image(&block, (kw / 2) as u8, (kh / 2) as u8)
}

fn square_mask(k: u32) -> Mask {
    Mask::square((k / 2).min(MAX_SIDE / 2) as u8)
}

fn is_empty(src: &GrayImage) -> bool {
    src.width() == 0 || src.height() == 0
}

/// Maximum over a `kw x kh` box.
pub fn dilate_rect(src: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    if is_empty(src) {
        return src.clone();
    }
    grayscale_dilate(src, &rect_mask(kw, kh))
}

/// White top-hat: the image minus its opening by a `k x k` square. Keeps
/// thin bright structure. `k` is expected odd.
pub fn top_hat(src: &GrayImage, k: u32) -> GrayImage {
    if is_empty(src) {
        return src.clone();
    }
    let opened = grayscale_open(src, &square_mask(k));
    difference(src, &opened)
}

/// Black-hat: the closing by a `k x k` square minus the image. Keeps thin
/// dark structure.
pub fn black_hat(src: &GrayImage, k: u32) -> GrayImage {
    if is_empty(src) {
        return src.clone();
    }
    let closed = grayscale_close(src, &square_mask(k));
    difference(&closed, src)
}

fn difference(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y)[0].saturating_sub(b.get_pixel(x, y)[0])])
    })
}

/// Binary opening with a 3x3 square, the classic speckle remover.
///
/// Also erases one-pixel-wide lines, which is what edge maps are made of.
pub fn open_square3(mask: &GrayImage) -> GrayImage {
    imageproc::morphology::open(mask, Norm::LInf, 1)
}

const LINE_DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Union of binary openings with three-pixel line segments in four
/// orientations.
///
/// A foreground pixel survives when it is part of a run of at least three
/// along some orientation, so isolated dots and pairs go while thin curves
/// stay.
pub fn open_lines3(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let fg = |x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && mask.get_pixel(x as u32, y as u32)[0] > 0
    };

    let eroded: Vec<Vec<bool>> = LINE_DIRECTIONS
        .iter()
        .map(|&(dx, dy)| {
            let mut e = vec![false; (w * h) as usize];
            for y in 0..h as i64 {
                for x in 0..w as i64 {
                    e[(y * w as i64 + x) as usize] =
                        fg(x - dx, y - dy) && fg(x, y) && fg(x + dx, y + dy);
                }
            }
            e
        })
        .collect();

    let hit = |e: &[bool], x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && e[(y * w as i64 + x) as usize]
    };

    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let keep = LINE_DIRECTIONS.iter().zip(&eroded).any(|(&(dx, dy), e)| {
            hit(e, x - dx, y - dy) || hit(e, x, y) || hit(e, x + dx, y + dy)
        });
        Luma([if keep { 255 } else { 0 }])
    })
}

/// Maps any nonzero sample to 255.
pub fn binarize(src: &GrayImage) -> GrayImage {
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        Luma([if src.get_pixel(x, y)[0] > 0 { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    #[test]
    fn top_hat_isolates_bright_line() {
        let mut img = field(30, 20, 100);
        for y in 0..20 {
            img.put_pixel(15, y, Luma([160]));
        }
        let th = top_hat(&img, 7);
        assert_eq!(th.get_pixel(15, 10)[0], 60);
        assert_eq!(th.get_pixel(5, 10)[0], 0);
        assert_eq!(black_hat(&img, 7).get_pixel(15, 10)[0], 0);
    }

    #[test]
    fn black_hat_isolates_dark_line() {
        let mut img = field(30, 20, 100);
        for y in 0..20 {
            img.put_pixel(15, y, Luma([40]));
        }
        let bh = black_hat(&img, 7);
        assert_eq!(bh.get_pixel(15, 3)[0], 60);
        assert_eq!(bh.get_pixel(14, 3)[0], 0);
        assert_eq!(top_hat(&img, 7).get_pixel(15, 3)[0], 0);
    }

    #[test]
    fn even_dilation_leans_towards_origin() {
        let mut img = field(9, 9, 0);
        img.put_pixel(4, 4, Luma([255]));
        let d = dilate_rect(&img, 2, 2);
        let on: Vec<(u32, u32)> = d
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(on, vec![(4, 4), (5, 4), (4, 5), (5, 5)]);
        assert_eq!(dilate_rect(&img, 1, 1), img);
    }

    #[test]
    fn odd_box_matches_centered_square() {
        let img = GrayImage::from_fn(17, 11, |x, y| Luma([((x * 37 + y * 91) % 251) as u8]));
        assert_eq!(dilate_rect(&img, 5, 5), grayscale_dilate(&img, &Mask::square(2)));
    }

    #[test]
    fn oversized_and_empty_inputs_do_not_panic() {
        let img = field(6, 4, 9);
        assert_eq!(dilate_rect(&img, 4000, 1), img);
        let empty = GrayImage::new(0, 0);
        assert_eq!(top_hat(&empty, 15).dimensions(), (0, 0));
        assert_eq!(black_hat(&empty, 15).dimensions(), (0, 0));
    }

    #[test]
    fn line_opening_drops_dots_keeps_curves() {
        let mut img = field(20, 20, 0);
        img.put_pixel(2, 2, Luma([255]));
        img.put_pixel(10, 2, Luma([255]));
        img.put_pixel(11, 2, Luma([255]));
        for i in 5..15 {
            img.put_pixel(i, i, Luma([255]));
        }
        let opened = open_lines3(&img);
        assert_eq!(opened.get_pixel(2, 2)[0], 0);
        assert_eq!(opened.get_pixel(10, 2)[0], 0);
        for i in 5..15 {
            assert_eq!(opened.get_pixel(i, i)[0], 255);
        }
    }

    #[test]
    fn square_opening_erases_thin_lines() {
        let mut img = field(20, 20, 0);
        for y in 0..20 {
            img.put_pixel(10, y, Luma([255]));
        }
        for y in 5..8 {
            for x in 2..5 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = open_square3(&img);
        assert_eq!(opened.get_pixel(10, 10)[0], 0);
        assert_eq!(opened.get_pixel(3, 6)[0], 255);
    }
}
