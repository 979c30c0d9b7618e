//! Width/whitespace normalization shared by the splitter, the section
//! parsers and the value normalizer. Portal pages mix full-width and
//! half-width forms freely, so every table lookup goes through here.

/// Convert full-width ASCII variants (U+FF01..U+FF5E) and the
/// ideographic space to their half-width equivalents. Other characters
/// pass through unchanged.
pub fn to_half_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => {
                char::from_u32(c as u32 - 0xFF01 + 0x21).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// Collapse runs of whitespace (including non-breaking spaces) into a
/// single space and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{00A0}')
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical form used for heading/label/title comparison: half-width,
/// lower-cased, bracket-normalized, whitespace-collapsed.
pub fn normalize_for_match(s: &str) -> String {
    let half = to_half_width(s);
    let bracketed: String = half
        .chars()
        .map(|c| match c {
            '（' => '(',
            '）' => ')',
            '【' => '[',
            '】' => ']',
            '「' => '[',
            '」' => ']',
            _ => c,
        })
        .collect();
    collapse_ws(&bracketed).to_lowercase()
}

/// Strip one trailing label delimiter («：», ":", «。») if present.
pub fn strip_trailing_punct(s: &str) -> &str {
    s.trim_end_matches(['：', ':', '。', '.', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_width_digits_and_letters() {
        assert_eq!(to_half_width("ＪＧＡＤ００１　ａｂｃ"), "JGAD001 abc");
    }

    #[test]
    fn half_width_leaves_kana_alone() {
        assert_eq!(to_half_width("非制限公開"), "非制限公開");
    }

    #[test]
    fn collapse_runs() {
        assert_eq!(collapse_ws("  a \u{00A0} b\t\nc "), "a b c");
    }

    #[test]
    fn match_form_is_stable() {
        let a = normalize_for_match("Ｍｏｌｅｃｕｌａｒ  Ｄａｔａ");
        assert_eq!(a, "molecular data");
        assert_eq!(normalize_for_match(&a), a);
    }

    #[test]
    fn trailing_label_punct() {
        assert_eq!(strip_trailing_punct("目的："), "目的");
        assert_eq!(strip_trailing_punct("Aims:"), "Aims");
    }
}
