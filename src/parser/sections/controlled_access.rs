//! Controlled-access data users: header cells map onto a fixed key set
//! by bilingual label matching (4- and 6-column layouts exist), with a
//! per-page hotfix table substituting pre-built records for known
//! malformed rows.

use scraper::ElementRef;
use tracing::{debug, warn};

use crate::html;
use crate::lookup::{self, cau_field_for_header, CauField};
use crate::model::{Lang, RawControlledAccessUser};
use crate::normalize::dataset_id::split_dataset_cell;

pub fn parse(
    els: Option<&[ElementRef]>,
    hum_id: &str,
    lang: Lang,
) -> Vec<RawControlledAccessUser> {
    let Some(els) = els else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for table in super::tables_in(els) {
        out.extend(parse_table(table, hum_id, lang));
    }
    out
}

fn parse_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<RawControlledAccessUser> {
    let mut grid = html::table_grid(table);
    if grid.is_empty() {
        return Vec::new();
    }

    let header = grid.remove(0);
    let fields: Vec<Option<CauField>> = header
        .iter()
        .map(|cell| {
            let text = html::element_text(*cell);
            let field = cau_field_for_header(&text);
            if field.is_none() {
                warn!(hum_id, lang = lang.as_str(), header = %text, "unmapped controlled-access header");
            }
            field
        })
        .collect();
    if fields.len() != 4 && fields.len() != 6 {
        debug!(hum_id, lang = lang.as_str(), cols = fields.len(), "unusual controlled-access layout");
    }

    grid.into_iter()
        .filter_map(|row| parse_row(&row, &fields, hum_id, lang))
        .collect()
}

fn parse_row(
    row: &[ElementRef],
    fields: &[Option<CauField>],
    hum_id: &str,
    lang: Lang,
) -> Option<RawControlledAccessUser> {
    let first_cell = row.first().map(|c| html::element_text(*c)).unwrap_or_default();
    if let Some(hotfix) = lookup::cau_hotfix_for(hum_id, row.len(), &first_cell) {
        debug!(hum_id, lang = lang.as_str(), "controlled-access hotfix row substituted");
        return Some(hotfix);
    }

    let mut rec = RawControlledAccessUser::default();
    for (cell, field) in row.iter().zip(fields) {
        let Some(field) = field else { continue };
        let text = html::element_text(*cell);
        if super::is_ignorable_text(&text) && *field != CauField::DatasetIds {
            continue;
        }
        match field {
            CauField::PrincipalInvestigator => rec.principal_investigator = Some(text),
            CauField::Affiliation => rec.affiliation = Some(text),
            CauField::Country => rec.country = Some(text),
            CauField::ResearchTitle => rec.research_title = Some(text),
            CauField::DatasetIds => {
                rec.dataset_ids = split_dataset_cell(&html::element_text_with_breaks(*cell));
            }
            CauField::PeriodOfDataUse => rec.period_of_data_use = Some(text),
        }
    }

    let all_empty = rec.principal_investigator.is_none()
        && rec.affiliation.is_none()
        && rec.research_title.is_none()
        && rec.dataset_ids.is_empty();
    (!all_empty).then_some(rec)
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
    fn absent_is_empty() {
        assert!(parse(None, "hum0001", Lang::Ja).is_empty());
    }

    #[test]
    fn four_column_japanese_layout() {
        let doc = parse_document(
            "<body><table>\
             <tr><td>研究代表者</td><td>所属機関</td><td>利用データID</td><td>利用期間</td></tr>\
             <tr><td>山田 太郎</td><td>東京大学</td><td>JGAD000001</td><td>2016/4/1-2019/3/31</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let users = parse(Some(&els), "hum0001", Lang::Ja);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].principal_investigator.as_deref(), Some("山田 太郎"));
        assert_eq!(users[0].dataset_ids, vec!["JGAD000001"]);
        assert_eq!(
            users[0].period_of_data_use.as_deref(),
            Some("2016/4/1-2019/3/31")
        );
        assert!(users[0].country.is_none());
    }

    #[test]
    fn six_column_english_layout() {
        let doc = parse_document(
            "<body><table>\
             <tr><td>Principal Investigator</td><td>Affiliation</td><td>Country</td>\
             <td>Research Title</td><td>Data in Use (Dataset ID)</td><td>Period of Data Use</td></tr>\
             <tr><td>Jane Doe</td><td>Example Institute</td><td>USA</td>\
             <td>Variant analysis</td><td>JGAD000002<br>JGAD000003</td><td>2020/1/1-2022/12/31</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let users = parse(Some(&els), "hum0002", Lang::En);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].country.as_deref(), Some("USA"));
        assert_eq!(users[0].dataset_ids, vec!["JGAD000002", "JGAD000003"]);
    }

    #[test]
    fn unmapped_header_column_ignored() {
        let doc = parse_document(
            "<body><table>\
             <tr><td>研究代表者</td><td>備考</td><td>利用データID</td><td>利用期間</td></tr>\
             <tr><td>佐藤 花子</td><td>メモ</td><td>JGAD000004</td><td>ー</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let users = parse(Some(&els), "hum0003", Lang::Ja);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].principal_investigator.as_deref(), Some("佐藤 花子"));
        assert!(users[0].affiliation.is_none());
        assert!(users[0].period_of_data_use.is_none());
    }

    #[test]
    fn hotfix_row_substitutes_prebuilt_record() {
        let doc = parse_document(
            "<body><table>\
             <tr><td>研究代表者</td><td>所属機関</td><td>利用データID</td><td>利用期間</td></tr>\
             <tr><td>松田 文彦</td><td>broken</td><td>layout</td><td>cells</td><td>extra</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let users = parse(Some(&els), "hum0031", Lang::Ja);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].dataset_ids, vec!["JGAD000031"]);
        assert_eq!(
            users[0].affiliation.as_deref(),
            Some("京都大学大学院医学研究科")
        );
    }

    #[test]
    fn empty_rows_skipped() {
        let doc = parse_document(
            "<body><table>\
             <tr><td>研究代表者</td><td>所属機関</td><td>利用データID</td><td>利用期間</td></tr>\
             <tr><td>ー</td><td>ー</td><td>ー</td><td>ー</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        assert!(parse(Some(&els), "hum0001", Lang::Ja).is_empty());
    }
}
