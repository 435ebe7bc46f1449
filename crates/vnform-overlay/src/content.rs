//! Content-stream operator construction for drawing Identity-H encoded text
//! runs (§4.7 "Rendering rules"). Shared by both the in-place field overlay
//! and the fallback summary page.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use ttf_parser::Face;

use crate::embed::FONT_RESOURCE_NAME;
use crate::glyphs::GlyphTable;

pub const LINE_HEIGHT: f32 = 12.0;

/// Builds `BT ... ET` operations drawing `lines` starting at `(x, y)`,
/// stepping down by `LINE_HEIGHT` per line.
pub fn draw_lines(face: &Face, table: &GlyphTable, font_size: f32, x: f32, y: f32, lines: &[String]) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE_NAME.as_bytes().to_vec()), font_size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
    ];
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            ops.push(Operation::new("Td", vec![0.0.into(), (-LINE_HEIGHT).into()]));
        }
        let encoded = table.encode(face, line);
        ops.push(Operation::new("Tj", vec![Object::String(encoded, StringFormat::Hexadecimal)]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}
