//! The `OcrEngine` trait boundary (§4.4 "OCR backend contract"): one method,
//! rasterized page in, ordered word records out. Grounded on
//! `docling-ocr`'s detection+recognition pipeline shape, but pulled behind
//! a trait so fixture-driven tests can substitute a deterministic stub
//! without loading ONNX model weights.

use image::DynamicImage;
use vnform_core::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl WordBox {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn baseline_y(&self) -> f32 {
        self.y + self.height
    }
}

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<WordBox>>;
}

/// A deterministic stand-in engine for tests (§8 property 4): returns a
/// fixed word list regardless of the image, so detector logic downstream
/// of OCR can be exercised without ONNX model weights.
#[derive(Debug, Clone, Default)]
pub struct StubOcrEngine {
    words: Vec<WordBox>,
}

impl StubOcrEngine {
    pub fn new(words: Vec<WordBox>) -> Self {
        StubOcrEngine { words }
    }

    pub fn empty() -> Self {
        StubOcrEngine { words: Vec::new() }
    }
}

impl OcrEngine for StubOcrEngine {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<WordBox>> {
        Ok(self.words.clone())
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxOcrEngine;

#[cfg(feature = "onnx")]
mod onnx {
    //! PaddleOCR-style detection+recognition pair behind the `OcrEngine`
    //! trait, following `docling-ocr`'s two-stage architecture: a DB-style
    //! detection model produces a probability map post-processed into word
    //! boxes, then each cropped region is fed to a CRNN-style recognition
    //! model and decoded with greedy CTC.

    use super::{OcrEngine, WordBox};
    use image::{DynamicImage, GenericImageView};
    use ndarray::{Array3, Array4};
    use ort::session::Session;
    use ort::value::TensorRef;
    use std::path::Path;
    use std::sync::Mutex;
    use vnform_core::error::{Result, VnFormError};

    const DET_INPUT_SIZE: u32 = 960;
    const REC_INPUT_HEIGHT: u32 = 48;
    const DET_PROB_THRESHOLD: f32 = 0.3;

    pub struct OnnxOcrEngine {
        det_session: Mutex<Session>,
        rec_session: Mutex<Session>,
        charset: Vec<char>,
    }

    impl OnnxOcrEngine {
        pub fn load(det_model: &Path, rec_model: &Path, charset: Vec<char>) -> Result<Self> {
            let det_session = Session::builder()
                .and_then(|b| b.commit_from_file(det_model))
                .map_err(|e| VnFormError::DetectorFailed(format!("load det model: {e}")))?;
            let rec_session = Session::builder()
                .and_then(|b| b.commit_from_file(rec_model))
                .map_err(|e| VnFormError::DetectorFailed(format!("load rec model: {e}")))?;
            Ok(OnnxOcrEngine {
                det_session: Mutex::new(det_session),
                rec_session: Mutex::new(rec_session),
                charset,
            })
        }

        fn preprocess_detection(&self, image: &DynamicImage) -> Array4<f32> {
            let resized = image.resize_exact(
                DET_INPUT_SIZE,
                DET_INPUT_SIZE,
                image::imageops::FilterType::Triangle,
            );
            let rgb = resized.to_rgb8();
            let mut tensor = Array4::<f32>::zeros((1, 3, DET_INPUT_SIZE as usize, DET_INPUT_SIZE as usize));
            for (x, y, pixel) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
                }
            }
            tensor
        }

        fn detect_boxes(&self, image: &DynamicImage) -> Result<Vec<(u32, u32, u32, u32)>> {
            let (orig_w, orig_h) = image.dimensions();
            let input = self.preprocess_detection(image);
            let mut session = self.det_session.lock().unwrap();
            let input_ref = TensorRef::from_array_view(&input)
                .map_err(|e| VnFormError::DetectorFailed(format!("det tensor: {e}")))?;
            let outputs = session
                .run(ort::inputs![input_ref])
                .map_err(|e| VnFormError::DetectorFailed(format!("det inference: {e}")))?;
            let prob_map = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| VnFormError::DetectorFailed(format!("det output: {e}")))?;

            let scale_x = orig_w as f32 / DET_INPUT_SIZE as f32;
            let scale_y = orig_h as f32 / DET_INPUT_SIZE as f32;
            let mut boxes = Vec::new();
            let view = prob_map.view();
            let shape = view.shape();
            if shape.len() < 4 {
                return Ok(boxes);
            }
            let (h, w) = (shape[2], shape[3]);
            let mut in_run = false;
            let mut run_start = 0usize;
            for row in 0..h {
                for col in 0..w {
                    let p = view[[0, 0, row, col]];
                    let on = p >= DET_PROB_THRESHOLD;
                    if on && !in_run {
                        in_run = true;
                        run_start = col;
                    } else if !on && in_run {
                        in_run = false;
                        let bw = col - run_start;
                        if bw > 3 {
                            boxes.push((
                                (run_start as f32 * scale_x) as u32,
                                (row as f32 * scale_y) as u32,
                                (bw as f32 * scale_x) as u32,
                                ((REC_INPUT_HEIGHT as f32 / 4.0) * scale_y) as u32,
                            ));
                        }
                    }
                }
                in_run = false;
            }
            Ok(boxes)
        }

        fn recognize_region(&self, image: &DynamicImage, bbox: (u32, u32, u32, u32)) -> Result<(String, f32)> {
            let (x, y, w, h) = bbox;
            let (img_w, img_h) = image.dimensions();
            let w = w.max(1).min(img_w.saturating_sub(x).max(1));
            let h = h.max(1).min(img_h.saturating_sub(y).max(1));
            let cropped = image.crop_imm(x, y, w, h);
            let target_w = ((REC_INPUT_HEIGHT as f32 / h as f32) * w as f32).round().max(1.0) as u32;
            let resized = cropped.resize_exact(target_w, REC_INPUT_HEIGHT, image::imageops::FilterType::Triangle);
            let gray = resized.to_luma8();

            let mut tensor = Array3::<f32>::zeros((1, REC_INPUT_HEIGHT as usize, target_w as usize));
            for (px, py, pixel) in gray.enumerate_pixels() {
                tensor[[0, py as usize, px as usize]] = (pixel[0] as f32 / 255.0 - 0.5) / 0.5;
            }
            let input = tensor.insert_axis(ndarray::Axis(1));

            let mut session = self.rec_session.lock().unwrap();
            let input_ref = TensorRef::from_array_view(&input)
                .map_err(|e| VnFormError::DetectorFailed(format!("rec tensor: {e}")))?;
            let outputs = session
                .run(ort::inputs![input_ref])
                .map_err(|e| VnFormError::DetectorFailed(format!("rec inference: {e}")))?;
            let logits = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| VnFormError::DetectorFailed(format!("rec output: {e}")))?;

            Ok(self.ctc_decode(logits.view()))
        }

        /// Greedy CTC decode: argmax per timestep, collapse repeats, drop blanks
        /// (index 0, per PaddleOCR convention).
        fn ctc_decode(&self, logits: ndarray::ArrayViewD<f32>) -> (String, f32) {
            let shape = logits.shape();
            if shape.len() < 3 {
                return (String::new(), 0.0);
            }
            let (timesteps, classes) = (shape[1], shape[2]);
            let mut text = String::new();
            let mut confidences = Vec::new();
            let mut prev_idx = usize::MAX;
            for t in 0..timesteps {
                let mut best_idx = 0;
                let mut best_val = f32::MIN;
                for c in 0..classes {
                    let v = logits[[0, t, c]];
                    if v > best_val {
                        best_val = v;
                        best_idx = c;
                    }
                }
                if best_idx != 0 && best_idx != prev_idx {
                    if let Some(ch) = self.charset.get(best_idx - 1) {
                        text.push(*ch);
                        confidences.push(best_val);
                    }
                }
                prev_idx = best_idx;
            }
            let avg_conf = if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f32>() / confidences.len() as f32
            };
            (text, avg_conf.clamp(0.0, 1.0))
        }
    }

    impl OcrEngine for OnnxOcrEngine {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<WordBox>> {
            let boxes = self.detect_boxes(image)?;
            let mut words = Vec::new();
            for bbox in boxes {
                let (text, confidence) = self.recognize_region(image, bbox)?;
                if text.is_empty() {
                    continue;
                }
                words.push(WordBox {
                    text,
                    x: bbox.0 as f32,
                    y: bbox.1 as f32,
                    width: bbox.2 as f32,
                    height: bbox.3 as f32,
                    confidence,
                });
            }
            Ok(words)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_engine_returns_fixed_words() {
        let words = vec![WordBox {
            text: "Họ tên:".to_string(),
            x: 10.0,
            y: 10.0,
            width: 60.0,
            height: 14.0,
            confidence: 0.95,
        }];
        let engine = StubOcrEngine::new(words.clone());
        let image = DynamicImage::new_rgb8(4, 4);
        assert_eq!(engine.recognize(&image).unwrap(), words);
    }
}
