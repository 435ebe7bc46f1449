//! Question rendering with cache and disambiguation lookback (§4.5
//! "Question rendering"). The cache itself lives on `FillingSession`
//! (`QuestionRecord`, `upsert_question`/`cached_question`); this module
//! supplies the lookback that derives a subject hint before calling
//! `vnform_llm::fallback::fallback_question`.

use vnform_core::model::FieldDescriptor;
use vnform_core::session::FillingSession;

const LOOKBACK_FIELDS: usize = 3;
const SUBJECT_KEYWORDS: &[&str] = &["CMND", "CCCD", "hộ chiếu", "Hộ chiếu", "căn cước", "Căn cước"];

/// Scans up to the last `LOOKBACK_FIELDS` fields before `field_idx` for a
/// label carrying a concrete subject (e.g. "Số CMND") the current,
/// ambiguous label ("cấp ngày") can borrow.
pub fn subject_hint<'a>(fields: &'a [FieldDescriptor], field_idx: usize) -> Option<&'a str> {
    let start = field_idx.saturating_sub(LOOKBACK_FIELDS);
    fields[start..field_idx].iter().rev().find_map(|f| {
        SUBJECT_KEYWORDS.iter().find(|kw| f.label.contains(**kw)).copied()
    })
}

/// Renders the question for `field`, preferring a cached prompt, else the
/// deterministic fallback with disambiguation. The caller (the engine) may
/// separately kick off an async LLM upgrade and write it back via
/// `FillingSession::upsert_question` — this function never calls C10 itself
/// so it stays synchronous and never blocks a turn.
pub fn render_cached_or_fallback(session: &FillingSession, fields: &[FieldDescriptor], field_idx: usize) -> String {
    let field = &fields[field_idx];
    if let Some(cached) = session.cached_question(&field.id) {
        return cached.prompt.clone();
    }
    let hint = subject_hint(fields, field_idx);
    vnform_llm::fallback::fallback_question(field, hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnform_core::model::FieldType;
    use vnform_core::session::ClientInfo;

    fn field(id: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor {
            id: id.to_string(),
            label: label.to_string(),
            field_type: FieldType::Text,
            required: true,
            page: 1,
            bbox: None,
            subfields: vec![],
        }
    }

    #[test]
    fn finds_subject_in_immediately_preceding_field() {
        let fields = vec![field("f0", "Số CMND"), field("f1", "Cấp ngày")];
        assert_eq!(subject_hint(&fields, 1), Some("CMND"));
    }

    #[test]
    fn does_not_look_back_further_than_three_fields() {
        let fields = vec![
            field("f0", "Số CMND"),
            field("f1", "Họ tên"),
            field("f2", "Địa chỉ"),
            field("f3", "Điện thoại"),
            field("f4", "Cấp ngày"),
        ];
        assert_eq!(subject_hint(&fields, 4), None);
    }

    #[test]
    fn render_uses_cache_when_present() {
        let mut session = FillingSession::new("s1".to_string(), "form1".to_string(), ClientInfo::default());
        session.upsert_question("f0", "Câu hỏi có sẵn:".to_string(), true);
        let fields = vec![field("f0", "Họ tên")];
        assert_eq!(render_cached_or_fallback(&session, &fields, 0), "Câu hỏi có sẵn:");
    }

    #[test]
    fn render_falls_back_with_disambiguation_when_uncached() {
        let session = FillingSession::new("s1".to_string(), "form1".to_string(), ClientInfo::default());
        let fields = vec![field("f0", "Số CMND"), field("f1", "Cấp ngày")];
        let question = render_cached_or_fallback(&session, &fields, 1);
        assert!(question.contains("CMND"));
    }
}
