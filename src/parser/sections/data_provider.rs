//! Data-provider section: 3–5 leading labeled paragraphs (principal
//! investigator, affiliation, project name, project URL) followed by a
//! grants table.

use scraper::ElementRef;
use tracing::debug;

use crate::html;
use crate::lookup::{provider_field_for_label, ProviderField};
use crate::model::{Lang, RawDataProvider, RawGrant, TextValue};
use crate::textutil::normalize_for_match;

pub fn parse(els: Option<&[ElementRef]>, hum_id: &str, lang: Lang) -> RawDataProvider {
    let Some(els) = els else {
        return RawDataProvider::default();
    };

    let mut out = RawDataProvider::default();
    // Positional fallback for old pages whose paragraphs carry no label.
    let positional = [
        ProviderField::PrincipalInvestigator,
        ProviderField::Affiliation,
        ProviderField::ProjectName,
    ];
    let mut position = 0usize;

    for el in els {
        let tables = html::descendant_tables(*el);
        if let Some(table) = tables.first() {
            out.grants = parse_grants_table(*table, hum_id, lang);
            break;
        }

        let text = html::element_text(*el);
        if super::is_ignorable_text(&text) {
            continue;
        }

        let field = match split_label(&text) {
            Some((field, _)) => field,
            None => {
                let Some(&field) = positional.get(position) else {
                    debug!(hum_id, lang = lang.as_str(), text = %text, "unlabeled provider paragraph dropped");
                    continue;
                };
                field
            }
        };
        position += 1;

        let value = labeled_value(*el, &text);
        match field {
            ProviderField::PrincipalInvestigator => out.principal_investigator = Some(value),
            ProviderField::Affiliation => out.affiliation = Some(value),
            ProviderField::ProjectName => out.project_name = Some(value),
            ProviderField::ProjectUrl => {
                out.project_url = html::anchors(*el)
                    .first()
                    .map(|a| a.href.clone())
                    .or_else(|| (!value.text.is_empty()).then(|| value.text.clone()));
            }
        }
    }

    out
}

/// Split «研究代表者：山田» into its field and the value part.
fn split_label(text: &str) -> Option<(ProviderField, String)> {
    let (label, value) = match text.split_once(['：', ':']) {
        Some((l, v)) => (l, v),
        None => (text, ""),
    };
    provider_field_for_label(label).map(|f| (f, value.trim().to_string()))
}

fn labeled_value(el: ElementRef, text: &str) -> TextValue {
    let mut tv = html::text_value(el);
    if let Some((_, value)) = split_label(text) {
        if !value.is_empty() {
            tv.text = value;
        } else if let Some((_, rest)) = tv.text.split_once(['：', ':']) {
            tv.text = rest.trim().to_string();
        }
    }
    tv
}

/// Grants table: name / title / project number, one or more numbers
/// per cell separated by `<br>`.
fn parse_grants_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<RawGrant> {
    let mut grid = html::table_grid(table);
    if grid.is_empty() {
        return Vec::new();
    }

    if is_grants_header(&grid[0]) {
        grid.remove(0);
    }

    grid.into_iter()
        .filter_map(|row| {
            if row.len() < 3 {
                debug!(hum_id, lang = lang.as_str(), cells = row.len(), "short grants row skipped");
                return None;
            }
            let grant_name = html::element_text(row[0]);
            let title = html::element_text(row[1]);
            let grant_ids: Vec<String> = html::element_text_with_breaks(row[2])
                .lines()
                .map(str::to_string)
                .filter(|l| !super::is_ignorable_text(l))
                .collect();
            let all_empty = super::is_ignorable_text(&grant_name)
                && super::is_ignorable_text(&title)
                && grant_ids.is_empty();
            (!all_empty).then_some(RawGrant {
                grant_name,
                title,
                grant_ids,
            })
        })
        .collect()
}

fn is_grants_header(row: &[ElementRef]) -> bool {
    let Some(first) = row.first() else { return false };
    let norm = normalize_for_match(&html::element_text(*first));
    norm.contains("助成") || norm.contains("grant") || norm.contains("事業名")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;
    use scraper::{Html, Selector};

    fn section_els(doc: &Html) -> Vec<ElementRef<'_>> {
        let sel = Selector::parse("body > *").unwrap();
        doc.select(&sel).collect()
    }

    #[test]
    fn absent_is_default() {
        let p = parse(None, "hum0001", Lang::Ja);
        assert!(p.principal_investigator.is_none());
        assert!(p.grants.is_empty());
    }

    #[test]
    fn labeled_paragraphs() {
        let doc = parse_document(
            "<body>\
             <p>研究代表者：山田 太郎</p>\
             <p>所属機関：東京大学</p>\
             <p>プロジェクト名：ゲノム医療実現プロジェクト</p>\
             <p>URL：<a href=\"https://example.org/project\">project</a></p>\
             </body>",
        );
        let els = section_els(&doc);
        let p = parse(Some(&els), "hum0001", Lang::Ja);
        assert_eq!(p.principal_investigator.unwrap().text, "山田 太郎");
        assert_eq!(p.affiliation.unwrap().text, "東京大学");
        assert_eq!(p.project_name.unwrap().text, "ゲノム医療実現プロジェクト");
        assert_eq!(p.project_url.as_deref(), Some("https://example.org/project"));
    }

    #[test]
    fn unlabeled_paragraphs_fall_back_to_position() {
        let doc = parse_document(
            "<body><p>John Smith</p><p>Example University</p></body>",
        );
        let els = section_els(&doc);
        let p = parse(Some(&els), "hum0002", Lang::En);
        assert_eq!(p.principal_investigator.unwrap().text, "John Smith");
        assert_eq!(p.affiliation.unwrap().text, "Example University");
        assert!(p.project_name.is_none());
    }

    #[test]
    fn grants_table_with_br_separated_numbers() {
        let doc = parse_document(
            "<body>\
             <p>Principal Investigator: Jane Doe</p>\
             <table>\
             <tr><td>Grant Name</td><td>Title</td><td>Project Number</td></tr>\
             <tr><td>AMED</td><td>Platform Program</td><td>JP18km0105001<br>JP19km0105002</td></tr>\
             </table>\
             </body>",
        );
        let els = section_els(&doc);
        let p = parse(Some(&els), "hum0003", Lang::En);
        assert_eq!(p.grants.len(), 1);
        assert_eq!(p.grants[0].grant_name, "AMED");
        assert_eq!(
            p.grants[0].grant_ids,
            vec!["JP18km0105001", "JP19km0105002"]
        );
    }

    #[test]
    fn historical_affiliation_spelling() {
        let doc = parse_document("<body><p>所 属：京都大学</p></body>");
        let els = section_els(&doc);
        let p = parse(Some(&els), "hum0004", Lang::Ja);
        assert_eq!(p.affiliation.unwrap().text, "京都大学");
    }
}
