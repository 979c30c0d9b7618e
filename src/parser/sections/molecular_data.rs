//! Molecular-data section: N tables, each preceded by an identifier
//! line, each a key/value listing (rowspan-expanded), with free text
//! between tables kept as the previous table's footers.

use scraper::ElementRef;
use tracing::debug;

use crate::html;
use crate::model::{Lang, MolDataTable, TextValue};

pub fn parse(els: Option<&[ElementRef]>, hum_id: &str, lang: Lang) -> Vec<MolDataTable> {
    let Some(els) = els else {
        return Vec::new();
    };

    let mut out: Vec<MolDataTable> = Vec::new();
    // Text elements seen since the last table. The last non-ignorable
    // one is the next table's identifier; the rest are footers of the
    // previous table.
    let mut pending: Vec<TextValue> = Vec::new();

    for el in els {
        let tables = html::descendant_tables(*el);
        if tables.is_empty() {
            let tv = html::text_value(*el);
            if !super::is_ignorable_text(&tv.text) {
                pending.push(tv);
            }
            continue;
        }

        for table in tables {
            let id = pending.pop().unwrap_or_else(|| {
                debug!(hum_id, lang = lang.as_str(), "molecular-data table without identifier");
                TextValue::from_text("")
            });
            if let Some(prev) = out.last_mut() {
                prev.footers.append(&mut pending);
            } else if !pending.is_empty() {
                debug!(
                    hum_id,
                    lang = lang.as_str(),
                    n = pending.len(),
                    "text before first molecular-data identifier dropped"
                );
                pending.clear();
            }
            out.push(MolDataTable {
                id,
                data: parse_kv_table(table, hum_id, lang),
                footers: Vec::new(),
            });
        }
    }

    if let Some(last) = out.last_mut() {
        last.footers.append(&mut pending);
    }

    out
}

/// Read a key/value table through the rowspan-expanded grid. Repeated
/// keys accumulate newline-joined instead of overwriting.
fn parse_kv_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<(String, TextValue)> {
    let mut data: Vec<(String, TextValue)> = Vec::new();

    for row in html::table_grid(table) {
        if row.len() < 2 {
            debug!(hum_id, lang = lang.as_str(), cells = row.len(), "short molecular-data row");
            continue;
        }
        let key = html::element_text(row[0]);
        let value_cell = row[row.len() - 1];
        let value = TextValue {
            text: html::element_text_with_breaks(value_cell),
            raw_html: html::sanitized_html(value_cell),
        };
        if key.is_empty() && value.text.is_empty() {
            continue;
        }
        if let Some((_, existing)) = data.iter_mut().find(|(k, _)| *k == key) {
            if !value.text.is_empty() {
                if !existing.text.is_empty() {
                    existing.text.push('\n');
                }
                existing.text.push_str(&value.text);
                existing.raw_html.push_str(&value.raw_html);
            }
        } else {
            data.push((key, value));
        }
    }

    data
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
    fn identifier_rows_and_footers() {
        let doc = parse_document(
            "<body>\
             <p>JGAD000001 エクソーム</p>\
             <table><tr><td>規模</td><td>100検体</td></tr></table>\
             <p>補足説明。</p>\
             <p>JGAD000002 全ゲノム</p>\
             <table><tr><td>規模</td><td>50検体</td></tr></table>\
             </body>",
        );
        let els = section_els(&doc);
        let tables = parse(Some(&els), "hum0001", Lang::Ja);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].id.text, "JGAD000001 エクソーム");
        assert_eq!(tables[0].data.len(), 1);
        assert_eq!(tables[0].data[0].0, "規模");
        assert_eq!(tables[0].data[0].1.text, "100検体");
        assert_eq!(tables[0].footers.len(), 1);
        assert_eq!(tables[0].footers[0].text, "補足説明。");
        assert_eq!(tables[1].id.text, "JGAD000002 全ゲノム");
        assert!(tables[1].footers.is_empty());
    }

    #[test]
    fn rowspan_cells_duplicate_into_rows() {
        let doc = parse_document(
            "<body><p>JGAD000003</p>\
             <table>\
             <tr><td rowspan=\"2\">Platform</td><td>HiSeq 2500</td></tr>\
             <tr><td>NovaSeq 6000</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let tables = parse(Some(&els), "hum0003", Lang::En);
        assert_eq!(tables.len(), 1);
        // Same key twice after expansion: values accumulate.
        assert_eq!(tables[0].data.len(), 1);
        assert_eq!(tables[0].data[0].1.text, "HiSeq 2500\nNovaSeq 6000");
    }

    #[test]
    fn repeated_keys_join_with_newline() {
        let doc = parse_document(
            "<body><p>JGAD000004</p>\
             <table>\
             <tr><td>Methods</td><td>WGS</td></tr>\
             <tr><td>Methods</td><td>RNA-seq</td></tr>\
             </table></body>",
        );
        let els = section_els(&doc);
        let tables = parse(Some(&els), "hum0004", Lang::En);
        assert_eq!(tables[0].data.len(), 1);
        assert_eq!(tables[0].data[0].1.text, "WGS\nRNA-seq");
    }

    #[test]
    fn trailing_text_is_last_tables_footer() {
        let doc = parse_document(
            "<body><p>JGAD000005</p>\
             <table><tr><td>k</td><td>v</td></tr></table>\
             <p>trailing note</p></body>",
        );
        let els = section_els(&doc);
        let tables = parse(Some(&els), "hum0005", Lang::En);
        assert_eq!(tables[0].footers.len(), 1);
        assert_eq!(tables[0].footers[0].text, "trailing note");
    }
}
