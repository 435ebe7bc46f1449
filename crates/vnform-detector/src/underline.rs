//! Strategy A, steps 1-3 (§4.4): grayscale, horizontal-underline detection
//! via morphological opening, and rectangular input-box detection via Canny
//! edges + contours.
//!
//! `imageproc` has no built-in rectangular structuring element (its
//! `morphology` module works with disk/diamond kernels), so the horizontal
//! opening is hand-rolled over a binary row representation — erode then
//! dilate with a 1-D window, which is exactly what a `(width, 1)`
//! structuring element does. Canny + contour extraction for boxes reuses
//! `imageproc::edges::canny` / `imageproc::contours::find_contours`
//! directly, matching `docling-ocr`'s usage of the same pair.

use image::{DynamicImage, GrayImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;

pub const KERNEL_WIDTHS: [u32; 3] = [25, 40, 60];
const MORPHOLOGY_ITERATIONS: u32 = 2;
const MIN_UNDERLINE_WIDTH: f32 = 30.0;
const DARK_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectBox {
    fn overlaps(&self, other: &RectBox) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

fn to_binary(gray: &GrayImage) -> Vec<Vec<bool>> {
    let (w, h) = gray.dimensions();
    let mut rows = vec![vec![false; w as usize]; h as usize];
    for y in 0..h {
        for x in 0..w {
            rows[y as usize][x as usize] = gray.get_pixel(x, y).0[0] < DARK_THRESHOLD;
        }
    }
    rows
}

/// One-dimensional horizontal erosion: a pixel survives only if every pixel
/// in a `width`-wide window centered on it is set.
fn horizontal_erode(row: &[bool], width: usize) -> Vec<bool> {
    let n = row.len();
    let half = width / 2;
    let mut out = vec![false; n];
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n.saturating_sub(1));
        out[i] = (lo..=hi).all(|j| row[j]);
    }
    out
}

/// One-dimensional horizontal dilation: a pixel is set if any pixel in a
/// `width`-wide window centered on it is set.
fn horizontal_dilate(row: &[bool], width: usize) -> Vec<bool> {
    let n = row.len();
    let half = width / 2;
    let mut out = vec![false; n];
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n.saturating_sub(1));
        out[i] = (lo..=hi).any(|j| row[j]);
    }
    out
}

fn morphological_open_row(row: &[bool], width: usize, iterations: u32) -> Vec<bool> {
    let mut current = row.to_vec();
    for _ in 0..iterations {
        current = horizontal_erode(&current, width);
    }
    for _ in 0..iterations {
        current = horizontal_dilate(&current, width);
    }
    current
}

/// Raw horizontal runs of "on" pixels per row, before cross-row merging.
fn row_runs(row: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &on) in row.iter().enumerate() {
        match (on, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - s));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, row.len() - s));
    }
    runs
}

/// Merge same-column runs across adjacent rows into a single underline box
/// (thin horizontal lines typically span 1-3 pixel rows).
fn merge_adjacent_rows(mut candidates: Vec<RectBox>) -> Vec<RectBox> {
    candidates.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap().then(a.x.partial_cmp(&b.x).unwrap()));
    let mut merged: Vec<RectBox> = Vec::new();
    for cand in candidates {
        if let Some(last) = merged.last_mut() {
            let same_column = (last.x - cand.x).abs() < 5.0 && (last.width - cand.width).abs() < 5.0;
            let adjacent_row = cand.y - (last.y + last.height) <= 1.0;
            if same_column && adjacent_row {
                last.height = cand.y + cand.height - last.y;
                continue;
            }
        }
        merged.push(cand);
    }
    merged
}

/// Detects horizontal underline segments across all three kernel widths and
/// deduplicates by proximity (§4.4 step 2).
pub fn detect_underlines(image: &DynamicImage) -> Vec<RectBox> {
    let gray = image.to_luma8();
    let binary = to_binary(&gray);

    let mut all_candidates = Vec::new();
    for &width in KERNEL_WIDTHS.iter() {
        let mut per_row = Vec::new();
        for (y, row) in binary.iter().enumerate() {
            let opened = morphological_open_row(row, width as usize, MORPHOLOGY_ITERATIONS);
            for (start, len) in row_runs(&opened) {
                if len as f32 >= MIN_UNDERLINE_WIDTH {
                    per_row.push(RectBox {
                        x: start as f32,
                        y: y as f32,
                        width: len as f32,
                        height: 1.0,
                    });
                }
            }
        }
        all_candidates.extend(merge_adjacent_rows(per_row));
    }

    dedup_by_proximity(all_candidates)
}

/// §4.4 step 2: "Deduplicate across kernel sizes by proximity
/// (|Δx|<30 ∧ |Δy|<10 ∧ |Δw|<50)".
fn dedup_by_proximity(mut candidates: Vec<RectBox>) -> Vec<RectBox> {
    candidates.sort_by(|a, b| b.width.partial_cmp(&a.width).unwrap());
    let mut kept: Vec<RectBox> = Vec::new();
    for cand in candidates {
        let is_duplicate = kept.iter().any(|k| {
            (k.x - cand.x).abs() < 30.0 && (k.y - cand.y).abs() < 10.0 && (k.width - cand.width).abs() < 50.0
        });
        if !is_duplicate {
            kept.push(cand);
        }
    }
    kept
}

/// §4.4 step 3: Canny edges + contour extraction for rectangular input
/// boxes, filtered by size/aspect and non-overlap with accepted underlines.
pub fn detect_boxes(image: &DynamicImage, underlines: &[RectBox]) -> Vec<RectBox> {
    let gray = image.to_luma8();
    let edges = canny(&gray, 50.0, 100.0);
    let contours = find_contours::<i32>(&edges);

    let mut boxes = Vec::new();
    for contour in contours {
        if contour.points.is_empty() {
            continue;
        }
        let (min_x, max_x) = contour
            .points
            .iter()
            .map(|p| p.x)
            .fold((i32::MAX, i32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let (min_y, max_y) = contour
            .points
            .iter()
            .map(|p| p.y)
            .fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));

        let width = (max_x - min_x) as f32;
        let height = (max_y - min_y) as f32;
        if height <= 0.0 {
            continue;
        }
        let aspect = width / height;

        if !(50.0..1000.0).contains(&width) || !(10.0..100.0).contains(&height) || aspect <= 2.0 {
            continue;
        }

        let candidate = RectBox {
            x: min_x as f32,
            y: min_y as f32,
            width,
            height,
        };
        if underlines.iter().any(|u| u.overlaps(&candidate)) {
            continue;
        }
        boxes.push(candidate);
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    fn image_with_horizontal_line(width: u32, height: u32, line_y: u32, line_len: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        for x in 10..(10 + line_len).min(width) {
            img.put_pixel(x, line_y, image::Rgb([0, 0, 0]));
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn detects_a_long_horizontal_line_as_underline() {
        let image = image_with_horizontal_line(300, 100, 50, 100);
        let underlines = detect_underlines(&image);
        assert!(underlines.iter().any(|u| u.width >= MIN_UNDERLINE_WIDTH));
    }

    #[test]
    fn rejects_a_line_narrower_than_minimum_width() {
        let image = image_with_horizontal_line(300, 100, 50, 15);
        let underlines = detect_underlines(&image);
        assert!(underlines.iter().all(|u| u.width < 15.5));
    }

    #[test]
    fn to_binary_marks_dark_pixels() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([255]));
        img.put_pixel(1, 1, Luma([0]));
        let binary = to_binary(&img);
        assert!(binary[1][1]);
        assert!(!binary[0][0]);
    }

    #[test]
    fn dedup_collapses_nearby_candidates() {
        let candidates = vec![
            RectBox { x: 10.0, y: 10.0, width: 100.0, height: 1.0 },
            RectBox { x: 12.0, y: 11.0, width: 95.0, height: 1.0 },
            RectBox { x: 200.0, y: 10.0, width: 100.0, height: 1.0 },
        ];
        let deduped = dedup_by_proximity(candidates);
        assert_eq!(deduped.len(), 2);
    }
}
