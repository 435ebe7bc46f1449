//! Strategy A, steps 4-7 (§4.4): OCR word grouping into labels, and the
//! label-to-element scoring that assigns each detected box/underline its
//! best caption.

use crate::ocr::WordBox;
use crate::underline::RectBox;
use vnform_core::model::{BBox, DetectionType, FieldPosition};

const MIN_WORD_LEN: usize = 2;
const GROUP_MAX_DY: f32 = 5.0;
const GROUP_MAX_GAP: f32 = 100.0;

const ABOVE_MAX_DX: f32 = 300.0;
const ABOVE_MAX_DY: f32 = 100.0;
const LEFT_MAX_DY: f32 = 30.0;
const LEFT_MAX_DX: f32 = 400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl GroupedLabel {
    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// §4.4 step 4-5: drop words shorter than two characters, then group
/// co-linear adjacent words (|Δy|<5 ∧ gap<100) preserving left-to-right
/// order and averaging confidence.
pub fn group_words(words: &[WordBox]) -> Vec<GroupedLabel> {
    let mut filtered: Vec<&WordBox> = words.iter().filter(|w| w.text.chars().count() >= MIN_WORD_LEN).collect();
    filtered.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap().then(a.x.partial_cmp(&b.x).unwrap()));

    let mut groups: Vec<Vec<&WordBox>> = Vec::new();
    for word in filtered {
        if let Some(last_group) = groups.last_mut() {
            let last_word = last_group.last().unwrap();
            let gap = word.x - (last_word.x + last_word.width);
            let dy = (word.y - last_word.y).abs();
            if dy < GROUP_MAX_DY && gap < GROUP_MAX_GAP {
                last_group.push(word);
                continue;
            }
        }
        groups.push(vec![word]);
    }

    groups
        .into_iter()
        .map(|group| {
            let text = group.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
            let x = group.iter().map(|w| w.x).fold(f32::MAX, f32::min);
            let y = group.iter().map(|w| w.y).fold(f32::MAX, f32::min);
            let right = group.iter().map(|w| w.x + w.width).fold(f32::MIN, f32::max);
            let bottom = group.iter().map(|w| w.y + w.height).fold(f32::MIN, f32::max);
            let confidence = group.iter().map(|w| w.confidence).sum::<f32>() / group.len() as f32;
            GroupedLabel {
                text,
                x,
                y,
                width: right - x,
                height: bottom - y,
                confidence,
            }
        })
        .collect()
}

/// §4.4 step 6: priority score for a label candidate against an element —
/// `10·len(text) + 50·(text endswith ':') + conf/10`.
fn priority_score(label: &GroupedLabel) -> f32 {
    let len_score = 10.0 * label.text.chars().count() as f32;
    let colon_score = if label.text.trim_end().ends_with(':') { 50.0 } else { 0.0 };
    len_score + colon_score + label.confidence / 10.0
}

fn euclidean_distance(label: &GroupedLabel, elem_x: f32, elem_y: f32) -> f32 {
    let dx = label.center_x() - elem_x;
    let dy = label.center_y() - elem_y;
    (dx * dx + dy * dy).sqrt()
}

/// One candidate input element (underline or box) awaiting a label.
#[derive(Debug, Clone, Copy)]
pub struct ElementCandidate {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<RectBox> for ElementCandidate {
    fn from(r: RectBox) -> Self {
        ElementCandidate { x: r.x, y: r.y, width: r.width, height: r.height }
    }
}

/// §4.4 step 6-7: for each element, search grouped labels above (same
/// column) or to the left (same row), rank by priority then proximity, and
/// emit one `FieldPosition` with the best match. Elements with no candidate
/// label are skipped (Strategy B may still anchor them via keywords).
pub fn assign_labels(elements: &[ElementCandidate], labels: &[GroupedLabel], page: u32) -> Vec<FieldPosition> {
    let mut positions = Vec::new();
    for (idx, elem) in elements.iter().enumerate() {
        let elem_center_x = elem.x + elem.width / 2.0;
        let elem_center_y = elem.y + elem.height / 2.0;

        let mut best: Option<(&GroupedLabel, f32, f32)> = None;
        for label in labels {
            let above = (label.center_x() - elem_center_x).abs() < ABOVE_MAX_DX
                && elem.y - label.y > 0.0
                && elem.y - label.y < ABOVE_MAX_DY;
            let left = (label.center_y() - elem_center_y).abs() < LEFT_MAX_DY
                && elem.x - label.x > 0.0
                && elem.x - label.x < LEFT_MAX_DX;
            if !above && !left {
                continue;
            }
            let score = priority_score(label);
            let distance = euclidean_distance(label, elem_center_x, elem_center_y);
            let is_better = match best {
                None => true,
                Some((_, best_score, best_distance)) => {
                    score > best_score || (score == best_score && distance < best_distance)
                }
            };
            if is_better {
                best = Some((label, score, distance));
            }
        }

        if let Some((label, _, _)) = best {
            positions.push(FieldPosition {
                field_id: format!("field_{idx}"),
                label: label.text.clone(),
                bbox: BBox { x: elem.x, y: elem.y, width: elem.width, height: elem.height, page },
                confidence: label.confidence,
                detection_type: DetectionType::Layout,
            });
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: f32, y: f32, w: f32) -> WordBox {
        WordBox { text: text.to_string(), x, y, width: w, height: 14.0, confidence: 0.9 }
    }

    #[test]
    fn groups_adjacent_colinear_words() {
        let words = vec![word("Họ", 10.0, 10.0, 20.0), word("tên:", 35.0, 10.0, 30.0)];
        let groups = group_words(&words);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "Họ tên:");
    }

    #[test]
    fn drops_short_words() {
        let words = vec![word("a", 10.0, 10.0, 5.0), word("tên:", 50.0, 10.0, 30.0)];
        let groups = group_words(&words);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "tên:");
    }

    #[test]
    fn assigns_label_above_element() {
        let labels = vec![GroupedLabel { text: "Họ tên:".to_string(), x: 10.0, y: 10.0, width: 60.0, height: 14.0, confidence: 0.9 }];
        let elements = vec![ElementCandidate { x: 10.0, y: 40.0, width: 150.0, height: 2.0 }];
        let positions = assign_labels(&elements, &labels, 1);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].label, "Họ tên:");
    }

    #[test]
    fn colon_suffix_breaks_a_near_tie_in_length() {
        let labels = vec![
            GroupedLabel { text: "Tenx".to_string(), x: 200.0, y: 10.0, width: 150.0, height: 14.0, confidence: 0.5 },
            GroupedLabel { text: "Tên:".to_string(), x: 10.0, y: 10.0, width: 40.0, height: 14.0, confidence: 0.5 },
        ];
        let elements = vec![ElementCandidate { x: 10.0, y: 40.0, width: 150.0, height: 2.0 }];
        let positions = assign_labels(&elements, &labels, 1);
        assert_eq!(positions[0].label, "Tên:");
    }
}
