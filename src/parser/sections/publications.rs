//! Publications section: a 4-column table (numbering, title, DOI,
//! dataset IDs). DOI prefers the anchor href over the cell text.

use scraper::ElementRef;
use tracing::debug;

use crate::html;
use crate::model::{Lang, RawPublication};
use crate::normalize::dataset_id::split_dataset_cell;
use crate::textutil::normalize_for_match;

pub fn parse(els: Option<&[ElementRef]>, hum_id: &str, lang: Lang) -> Vec<RawPublication> {
    let Some(els) = els else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for table in super::tables_in(els) {
        out.extend(parse_table(table, hum_id, lang));
    }
    out
}

fn parse_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<RawPublication> {
    let mut grid = html::table_grid(table);
    if grid.is_empty() {
        return Vec::new();
    }

    if is_header_row(&grid[0]) {
        grid.remove(0);
    }

    grid.into_iter()
        .filter_map(|row| {
            // 4 columns with a leading blank/numbering column; a few
            // old pages omit it.
            let (title_i, doi_i, ids_i) = match row.len() {
                4.. => (1, 2, 3),
                3 => (0, 1, 2),
                n => {
                    debug!(hum_id, lang = lang.as_str(), cells = n, "short publications row skipped");
                    return None;
                }
            };

            let title = html::element_text(row[title_i]);
            let doi = doi_from_cell(row[doi_i]);
            let dataset_ids = split_dataset_cell(&html::element_text_with_breaks(row[ids_i]));

            let all_empty =
                super::is_ignorable_text(&title) && doi.is_empty() && dataset_ids.is_empty();
            (!all_empty).then_some(RawPublication {
                title,
                doi,
                dataset_ids,
            })
        })
        .collect()
}

fn doi_from_cell(cell: ElementRef) -> String {
    if let Some(link) = html::anchors(cell).into_iter().next() {
        return link.href;
    }
    let text = html::element_text(cell);
    if super::is_ignorable_text(&text) {
        String::new()
    } else {
        text
    }
}

fn is_header_row(row: &[ElementRef]) -> bool {
    row.iter().any(|c| {
        let norm = normalize_for_match(&html::element_text(*c));
        norm == "doi" || norm.contains("title") || norm.contains("タイトル")
    })
}
