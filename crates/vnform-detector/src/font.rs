//! Font metadata (§4.4 "Font metadata"): parse the PDF's first-page font
//! dictionary, preferring Times/Liberation, else Arial/Helvetica, else a
//! default. Grounded on `lopdf`'s `Document`/dictionary traversal as used
//! for metadata extraction elsewhere in the teacher (`sg`'s low-level PDF
//! parsing for page counts / media boxes).

use lopdf::{Document, Object};
use vnform_core::model::FontInfo;

const PREFERRED_SERIF: &[&str] = &["Times", "Liberation Serif", "LiberationSerif"];
const PREFERRED_SANS: &[&str] = &["Arial", "Helvetica"];
const DEFAULT_FONT: &str = "Helvetica";
const DEFAULT_SIZE: f32 = 12.0;
const MAX_OBSERVED_FONTS: usize = 5;

/// Extracts observed font base names from the first page's `/Resources/Font`
/// dictionary, then chooses a primary font per the preference order above.
pub fn extract_font_info(doc: &Document) -> FontInfo {
    let observed = observed_font_names(doc);
    let primary_font = choose_primary(&observed);
    FontInfo {
        primary_font,
        default_size: DEFAULT_SIZE,
        observed_fonts: observed.into_iter().take(MAX_OBSERVED_FONTS).collect(),
    }
}

fn observed_font_names(doc: &Document) -> Vec<String> {
    let Some(&page_id) = doc.get_pages().values().next() else {
        return Vec::new();
    };
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Ok(resources) = page
        .get(b"Resources")
        .and_then(|obj| doc.dereference(obj))
        .map(|(_, obj)| obj)
    else {
        return Vec::new();
    };
    let Object::Dictionary(resources) = resources else {
        return Vec::new();
    };
    let Some(fonts) = resources.get(b"Font").ok() else {
        return Vec::new();
    };
    let Ok((_, fonts)) = doc.dereference(fonts) else {
        return Vec::new();
    };
    let Object::Dictionary(fonts) = fonts else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for (_, font_ref) in fonts.iter() {
        let Ok((_, font_obj)) = doc.dereference(font_ref) else {
            continue;
        };
        let Object::Dictionary(font_dict) = font_obj else {
            continue;
        };
        if let Ok(Object::Name(base_font)) = font_dict.get(b"BaseFont") {
            if let Ok(name) = String::from_utf8(base_font.clone()) {
                names.push(strip_subset_tag(&name));
            }
        }
    }
    names
}

/// Strips the six-letter `ABCDEF+` subset prefix PDF producers add to
/// embedded-font base names (e.g. `ABCDEF+TimesNewRoman` -> `TimesNewRoman`).
fn strip_subset_tag(name: &str) -> String {
    if name.len() > 7 && name.as_bytes()[6] == b'+' && name[..6].chars().all(|c| c.is_ascii_uppercase()) {
        name[7..].to_string()
    } else {
        name.to_string()
    }
}

fn choose_primary(observed: &[String]) -> String {
    for preferred in PREFERRED_SERIF {
        if let Some(found) = observed.iter().find(|n| n.contains(preferred)) {
            return found.clone();
        }
    }
    for preferred in PREFERRED_SANS {
        if let Some(found) = observed.iter().find(|n| n.contains(preferred)) {
            return found.clone();
        }
    }
    DEFAULT_FONT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_subset_tag_prefix() {
        assert_eq!(strip_subset_tag("ABCDEF+TimesNewRoman"), "TimesNewRoman");
        assert_eq!(strip_subset_tag("Arial"), "Arial");
    }

    #[test]
    fn prefers_serif_over_sans() {
        let observed = vec!["Arial".to_string(), "TimesNewRomanPSMT".to_string()];
        assert_eq!(choose_primary(&observed), "TimesNewRomanPSMT");
    }

    #[test]
    fn falls_back_to_default_when_nothing_preferred_observed() {
        let observed = vec!["Wingdings".to_string()];
        assert_eq!(choose_primary(&observed), DEFAULT_FONT);
    }

    #[test]
    fn extract_font_info_on_empty_document_yields_default() {
        let doc = Document::with_version("1.5");
        let info = extract_font_info(&doc);
        assert_eq!(info.primary_font, DEFAULT_FONT);
        assert_eq!(info.default_size, DEFAULT_SIZE);
        assert!(info.observed_fonts.is_empty());
    }
}
