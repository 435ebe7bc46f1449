//! Image-pixel to PDF-point coordinate transform (§4.7 "Coordinate
//! transform"). Detector bboxes are top-left-origin pixels; PDF space is
//! bottom-left-origin points, so every draw position flips the Y axis.
//! Never mix these two systems outside this module.

use vnform_core::model::BBox;

/// Fraction of the bbox height used as a baseline offset, so text sits on
/// the line the detector framed rather than hanging from its top edge.
const BASELINE_OFFSET_RATIO: f32 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

pub fn scale_factors(page_width: f32, page_height: f32, image_width: f32, image_height: f32) -> ScaleFactors {
    ScaleFactors {
        x: page_width / image_width,
        y: page_height / image_height,
    }
}

/// The bottom-left PDF point at which to start drawing `bbox`'s answer.
pub fn draw_position(bbox: &BBox, page_height: f32, scale: ScaleFactors) -> (f32, f32) {
    let x = bbox.x * scale.x;
    let y = page_height - bbox.y * scale.y - BASELINE_OFFSET_RATIO * bbox.height * scale.y;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, width: f32, height: f32) -> BBox {
        BBox { x, y, width, height, page: 1 }
    }

    #[test]
    fn identity_scale_flips_y_and_applies_baseline_offset() {
        let scale = scale_factors(600.0, 800.0, 600.0, 800.0);
        let (x, y) = draw_position(&bbox(100.0, 100.0, 200.0, 20.0), 800.0, scale);
        assert_eq!(x, 100.0);
        // page_height - y - 0.7*h = 800 - 100 - 14 = 686
        assert_eq!(y, 686.0);
    }

    #[test]
    fn scale_halves_both_axes() {
        let scale = scale_factors(300.0, 400.0, 600.0, 800.0);
        assert_eq!(scale.x, 0.5);
        assert_eq!(scale.y, 0.5);
        let (x, y) = draw_position(&bbox(100.0, 100.0, 200.0, 20.0), 400.0, scale);
        assert_eq!(x, 50.0);
        // page_height - y*0.5 - 0.7*20*0.5 = 400 - 50 - 7 = 343
        assert_eq!(y, 343.0);
    }
}
