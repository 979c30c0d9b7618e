//! Heading-driven page splitting. Walks the body's children in order,
//! discards portal boilerplate before the first recognized heading,
//! and collects the content between one heading and the next into that
//! heading's section. Two recovery heuristics then fix layouts a
//! handful of pages get wrong.

use std::collections::HashMap;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::html;
use crate::lookup::{section_kind_for_heading, SectionKind};
use crate::model::Lang;
use crate::textutil::normalize_for_match;

/// One page's markup split into named sections. Constructed fresh per
/// page; never mutated after the recovery pass.
#[derive(Debug, Default)]
pub struct Sections<'a> {
    map: HashMap<SectionKind, Vec<ElementRef<'a>>>,
}

impl<'a> Sections<'a> {
    pub fn get(&self, kind: SectionKind) -> Option<&[ElementRef<'a>]> {
        self.map.get(&kind).map(|v| v.as_slice())
    }
}

/// Split one language's detail page. Only a missing/empty body is
/// fatal; every section is optional downstream.
pub fn split_page<'a>(
    doc: &'a Html,
    hum_id: &str,
    lang: Lang,
) -> anyhow::Result<Sections<'a>> {
    let children = html::body_children(doc)?;

    let mut map: HashMap<SectionKind, Vec<ElementRef<'a>>> = HashMap::new();
    let mut current: Option<SectionKind> = None;

    for el in children {
        if let Some(kind) = heading_kind(el) {
            if map.contains_key(&kind) {
                debug!(hum_id, lang = lang.as_str(), ?kind, "duplicate section heading");
            }
            map.entry(kind).or_default();
            current = Some(kind);
            continue;
        }
        if html::is_heading_tag(el) {
            // Recognized tag, unrecognized text: the element stays in
            // the current section so the content behind it survives
            // and the molecular-data rescue can back up over it.
            debug!(
                hum_id,
                lang = lang.as_str(),
                text = %html::element_text(el),
                "unrecognized heading"
            );
        }
        match current {
            Some(kind) => map.entry(kind).or_default().push(el),
            None => {} // boilerplate before the first recognized heading
        }
    }

    let mut sections = Sections { map };
    rescue_misfiled_publications(&mut sections, hum_id, lang);
    rescue_headingless_molecular_data(&mut sections, hum_id, lang);
    Ok(sections)
}

/// A heading is an h1–h6, or a short bold-styled element whose whole
/// text matches a section name (some older pages style headings as
/// bold paragraphs). Plain paragraphs never qualify, so body text that
/// happens to equal a section name stays content.
fn heading_kind(el: ElementRef) -> Option<SectionKind> {
    let text = html::element_text(el);
    if html::is_heading_tag(el) {
        return section_kind_for_heading(&text);
    }
    let bold = matches!(el.value().name(), "b" | "strong") || html::first_bold(el).is_some();
    if bold && normalize_for_match(&text).chars().count() <= 40 {
        return crate::lookup::section_kind_for_heading_exact(&text);
    }
    None
}

/// Recovery (a): a publications-shaped table (headers mentioning
/// title/DOI/dataset-ID) misfiled inside the controlled-access-users
/// section moves to publications.
fn rescue_misfiled_publications(sections: &mut Sections<'_>, hum_id: &str, lang: Lang) {
    let Some(cau) = sections.map.get(&SectionKind::ControlledAccessUsers) else {
        return;
    };

    let misfiled: Vec<usize> = cau
        .iter()
        .enumerate()
        .filter(|(_, el)| {
            html::descendant_tables(**el)
                .iter()
                .any(|t| looks_like_publications_table(*t))
        })
        .map(|(i, _)| i)
        .collect();
    if misfiled.is_empty() {
        return;
    }

    debug!(hum_id, lang = lang.as_str(), n = misfiled.len(), "moving misfiled publications table");
    let cau = sections.map.get_mut(&SectionKind::ControlledAccessUsers).unwrap();
    let mut moved = Vec::new();
    for i in misfiled.into_iter().rev() {
        moved.push(cau.remove(i));
    }
    moved.reverse();
    sections
        .map
        .entry(SectionKind::Publications)
        .or_default()
        .extend(moved);
}

fn looks_like_publications_table(table: ElementRef) -> bool {
    let grid = html::table_grid(table);
    let Some(header) = grid.first() else { return false };
    let texts: Vec<String> = header
        .iter()
        .map(|c| normalize_for_match(&html::element_text(*c)))
        .collect();
    let has_title = texts.iter().any(|t| t.contains("title") || t.contains("タイトル") || t.contains("論文"));
    let has_doi = texts.iter().any(|t| t.contains("doi"));
    let has_ids = texts
        .iter()
        .any(|t| t.contains("dataset") || t.contains("データセット") || t.contains("データid"));
    has_doi && (has_title || has_ids)
}

/// Recovery (b): no molecular-data heading, but the summary section
/// carries a second table. Everything from just after the first table
/// onward belongs to molecular data; if identifier lines or stray
/// headings sit between the tables the boundary backs up to include
/// them.
fn rescue_headingless_molecular_data(sections: &mut Sections<'_>, hum_id: &str, lang: Lang) {
    if sections.map.contains_key(&SectionKind::MolecularData) {
        return;
    }
    let Some(summary) = sections.map.get(&SectionKind::Summary) else {
        return;
    };

    let table_positions: Vec<usize> = summary
        .iter()
        .enumerate()
        .filter(|(_, el)| !html::descendant_tables(**el).is_empty())
        .map(|(i, _)| i)
        .collect();
    if table_positions.len() < 2 {
        return;
    }

    // Boundary sits just after the element holding the first table.
    // Identifier lines and stray headings between the two tables fall
    // on the molecular-data side of it.
    let first = table_positions[0];
    let boundary = first + 1;

    debug!(
        hum_id,
        lang = lang.as_str(),
        boundary,
        "reassigning summary tail to molecular data"
    );
    let summary = sections.map.get_mut(&SectionKind::Summary).unwrap();
    let tail: Vec<ElementRef> = summary.split_off(boundary);
    sections.map.insert(SectionKind::MolecularData, tail);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn kinds(markup: &str) -> Vec<SectionKind> {
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::Ja).unwrap();
        let mut out: Vec<SectionKind> = s.map.keys().copied().collect();
        out.sort_by_key(|k| format!("{:?}", k));
        out
    }

    #[test]
    fn basic_split_by_headings() {
        let markup = "<body>\
            <p>portal boilerplate</p>\
            <h2>概要</h2><p>aims text</p>\
            <h2>分子データ</h2><table><tr><td>k</td><td>v</td></tr></table>\
            <h2>提供者情報</h2><p>PI</p>\
            </body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::Ja).unwrap();
        assert_eq!(s.get(SectionKind::Summary).unwrap().len(), 1);
        assert_eq!(s.get(SectionKind::MolecularData).unwrap().len(), 1);
        assert_eq!(s.get(SectionKind::DataProvider).unwrap().len(), 1);
        assert!(s.get(SectionKind::Publications).is_none());
    }

    #[test]
    fn content_before_first_heading_discarded() {
        let markup = "<body><p>menu</p><p>banner</p><h2>Summary</h2><p>real</p></body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::En).unwrap();
        let summary = s.get(SectionKind::Summary).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(crate::html::element_text(summary[0]), "real");
    }

    #[test]
    fn content_after_stray_heading_retained() {
        let markup = "<body><h2>概要</h2><p>a</p><h2>お知らせ</h2><p>b</p></body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::Ja).unwrap();
        let summary = s.get(SectionKind::Summary).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(crate::html::element_text(summary[2]), "b");
    }

    #[test]
    fn stray_heading_between_tables_recovered() {
        let markup = "<body>\
            <h2>概要</h2>\
            <table><tr><td>ID</td><td>Type</td><td>Criteria</td><td>Date</td></tr></table>\
            <h3>Sequence data</h3>\
            <p>JGAD000001 Exome</p>\
            <table><tr><td>k</td><td>v</td></tr></table>\
            </body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0007", Lang::En).unwrap();
        let mol = s.get(SectionKind::MolecularData).unwrap();
        // Stray heading, identifier line and second table all moved.
        assert_eq!(mol.len(), 3);
        assert_eq!(s.get(SectionKind::Summary).unwrap().len(), 1);
    }

    #[test]
    fn plain_paragraph_matching_section_name_stays_content() {
        let markup = "<body><h2>Summary</h2><p>aims</p><p>more text</p></body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::En).unwrap();
        assert_eq!(s.get(SectionKind::Summary).unwrap().len(), 2);
    }

    #[test]
    fn styled_paragraph_heading_recognized() {
        let markup = "<body><p><b>Molecular Data</b></p><table><tr><td>k</td><td>v</td></tr></table></body>";
        assert!(kinds(markup).contains(&SectionKind::MolecularData));
    }

    #[test]
    fn misfiled_publications_table_moves() {
        let markup = "<body>\
            <h2>制限公開データの利用者一覧</h2>\
            <table><tr><td>研究代表者</td><td>所属機関</td><td>利用データID</td><td>利用期間</td></tr></table>\
            <table><tr><td></td><td>Title</td><td>DOI</td><td>Dataset ID</td></tr>\
            <tr><td>1.</td><td>A paper</td><td>10.1000/x</td><td>JGAD000001</td></tr></table>\
            </body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0012", Lang::En).unwrap();
        let pubs = s.get(SectionKind::Publications).unwrap();
        assert_eq!(pubs.len(), 1);
        let cau = s.get(SectionKind::ControlledAccessUsers).unwrap();
        assert_eq!(cau.len(), 1);
    }

    #[test]
    fn headingless_molecular_data_reassigned() {
        let markup = "<body>\
            <h2>概要</h2>\
            <p>aims</p>\
            <table><tr><td>ID</td><td>Type</td><td>Criteria</td><td>Date</td></tr></table>\
            <p>JGAD000001 Exome</p>\
            <table><tr><td>k</td><td>v</td></tr></table>\
            </body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0005", Lang::En).unwrap();
        let mol = s.get(SectionKind::MolecularData).unwrap();
        // Identifier line + second table both moved.
        assert_eq!(mol.len(), 2);
        let summary = s.get(SectionKind::Summary).unwrap();
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn single_table_summary_left_alone() {
        let markup = "<body><h2>概要</h2><p>aims</p>\
            <table><tr><td>ID</td></tr></table></body>";
        let doc = parse_document(markup);
        let s = split_page(&doc, "hum0001", Lang::Ja).unwrap();
        assert!(s.get(SectionKind::MolecularData).is_none());
        assert_eq!(s.get(SectionKind::Summary).unwrap().len(), 2);
    }
}
