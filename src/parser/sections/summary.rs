//! Summary section: labeled free text (aims/methods/targets/url), the
//! dataset overview table, and trailing footers.

use scraper::ElementRef;
use tracing::debug;

use crate::html;
use crate::lookup::{summary_field_for_label, SummaryField};
use crate::model::{Lang, RawSummary, RawSummaryDataset, TextValue};
use crate::textutil::normalize_for_match;

/// Expected dataset-table headers, for log-only validation.
const EXPECTED_HEADERS: &[&[&str]] = &[
    &["データセットid", "dataset id"],
    &["データの種別", "種別", "type of data"],
    &["制限", "criteria"],
    &["公開日", "release date"],
];

pub fn parse(els: Option<&[ElementRef]>, hum_id: &str, lang: Lang) -> RawSummary {
    let Some(els) = els else {
        return RawSummary::default();
    };

    let mut out = RawSummary::default();
    let mut current: Option<SummaryField> = None;
    let mut seen_table = false;

    for el in els {
        let tables = html::descendant_tables(*el);
        if let Some(table) = tables.first() {
            if !seen_table {
                out.datasets = parse_dataset_table(*table, hum_id, lang);
                seen_table = true;
                current = None;
            } else {
                debug!(hum_id, lang = lang.as_str(), "extra table in summary ignored");
            }
            continue;
        }

        if seen_table {
            let tv = html::text_value(*el);
            if !super::is_ignorable_text(&tv.text) {
                out.footers.push(tv);
            }
            continue;
        }

        route_text(*el, &mut current, &mut out);
    }

    out
}

/// Route one pre-table element into aims/methods/targets/url. A bold
/// label switches the current field; unlabeled text keeps appending to
/// whatever field is current.
fn route_text(el: ElementRef, current: &mut Option<SummaryField>, out: &mut RawSummary) {
    if let Some(bold) = html::first_bold(el) {
        if let Some(field) = summary_field_for_label(&html::element_text(bold)) {
            *current = Some(field);
            let tv = strip_label(el, &html::element_text(bold));
            append_field(out, field, tv, el);
            return;
        }
    }
    let Some(field) = *current else { return };
    let tv = html::text_value(el);
    append_field(out, field, tv, el);
}

fn append_field(out: &mut RawSummary, field: SummaryField, tv: TextValue, el: ElementRef) {
    match field {
        SummaryField::Aims => push_nonempty(&mut out.aims, tv),
        SummaryField::Methods => push_nonempty(&mut out.methods, tv),
        SummaryField::Targets => push_nonempty(&mut out.targets, tv),
        SummaryField::Url => out.urls.extend(html::anchors(el)),
    }
}

fn push_nonempty(v: &mut Vec<TextValue>, tv: TextValue) {
    if !tv.text.is_empty() {
        v.push(tv);
    }
}

/// Remove the leading label (and its delimiter) from the element's
/// plain text; the sanitized fragment keeps the full element.
fn strip_label(el: ElementRef, label: &str) -> TextValue {
    let mut tv = html::text_value(el);
    if let Some(rest) = tv.text.strip_prefix(label) {
        tv.text = rest.trim_start_matches(['：', ':', ' ']).to_string();
    }
    tv
}

fn parse_dataset_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<RawSummaryDataset> {
    let mut grid = html::table_grid(table);
    if grid.is_empty() {
        return Vec::new();
    }

    // 5-column layout carries an extra leading numbering column.
    let width = grid[0].len();
    let offset = if width == 5 { 1 } else { 0 };
    if width != 4 && width != 5 {
        debug!(hum_id, lang = lang.as_str(), width, "unexpected summary table width");
    }

    validate_headers(&grid[0][offset..], hum_id, lang);
    grid.remove(0);

    grid.into_iter()
        .filter_map(|row| {
            if row.len() < offset + 4 {
                debug!(hum_id, lang = lang.as_str(), cells = row.len(), "short summary row skipped");
                return None;
            }
            let cell = |i: usize| html::element_text(row[offset + i]);
            let rec = RawSummaryDataset {
                dataset_id: cell(0),
                type_of_data: cell(1),
                criteria: cell(2),
                release_date: cell(3),
            };
            let all_empty = [&rec.dataset_id, &rec.type_of_data, &rec.criteria, &rec.release_date]
                .iter()
                .all(|s| super::is_ignorable_text(s));
            (!all_empty).then_some(rec)
        })
        .collect()
}

/// Header check is log-only; an odd header never blocks row parsing.
fn validate_headers(cells: &[ElementRef], hum_id: &str, lang: Lang) {
    for (i, expected) in EXPECTED_HEADERS.iter().enumerate() {
        let Some(cell) = cells.get(i) else { continue };
        let norm = normalize_for_match(&html::element_text(*cell));
        if !expected.iter().any(|e| norm.contains(e)) {
            debug!(
                hum_id,
                lang = lang.as_str(),
                col = i,
                header = %norm,
                "unexpected summary table header"
            );
        }
    }
}
