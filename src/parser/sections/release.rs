//! Release history: a table of (humVersionId, release date, content)
//! rows plus free-text release notes attached to the nearest preceding
//! humVersionId line, stopping at a «Note:»-prefixed line.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use tracing::debug;

use crate::html;
use crate::model::{Lang, RawRelease, RawReleaseRow, ReleaseNote};
use crate::textutil::normalize_for_match;

static HUM_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hum\d+[-.]v\d+").unwrap());

const NOTE_PREFIXES: &[&str] = &["note:", "注:", "注意:"];

pub fn parse(els: Option<&[ElementRef]>, hum_id: &str, lang: Lang) -> RawRelease {
    let Some(els) = els else {
        return RawRelease::default();
    };

    let mut out = RawRelease::default();
    let mut past_table = false;
    let mut current_version: Option<String> = None;

    for el in els {
        let tables = html::descendant_tables(*el);
        if let Some(table) = tables.first() {
            out.rows.extend(parse_table(*table, hum_id, lang));
            past_table = true;
            continue;
        }
        if !past_table {
            continue;
        }

        for line in html::element_text_with_breaks(*el).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let norm = normalize_for_match(line);
            if NOTE_PREFIXES.iter().any(|p| norm.starts_with(p)) {
                current_version = None;
                continue;
            }
            if let Some(m) = HUM_VERSION_RE.find(line) {
                current_version = Some(m.as_str().to_string());
                let rest = line[m.end()..].trim_start_matches(['：', ':', ' ']).trim();
                if !rest.is_empty() {
                    push_note(&mut out.notes, current_version.as_deref(), rest);
                }
                continue;
            }
            match &current_version {
                Some(v) => push_note(&mut out.notes, Some(v), line),
                None => debug!(hum_id, lang = lang.as_str(), line, "release note without version dropped"),
            }
        }
    }

    out
}

fn push_note(notes: &mut Vec<ReleaseNote>, version: Option<&str>, text: &str) {
    let Some(version) = version else { return };
    if let Some(existing) = notes.iter_mut().find(|n| n.hum_version_id == version) {
        if !existing.text.is_empty() {
            existing.text.push('\n');
        }
        existing.text.push_str(text);
    } else {
        notes.push(ReleaseNote {
            hum_version_id: version.to_string(),
            text: text.to_string(),
        });
    }
}

fn parse_table(table: ElementRef, hum_id: &str, lang: Lang) -> Vec<RawReleaseRow> {
    let mut grid = html::table_grid(table);
    if grid.is_empty() {
        return Vec::new();
    }
    if is_header_row(&grid[0]) {
        grid.remove(0);
    }

    grid.into_iter()
        .filter_map(|row| {
            if row.len() < 3 {
                debug!(hum_id, lang = lang.as_str(), cells = row.len(), "short release row skipped");
                return None;
            }
            let version_text = html::element_text(row[0]);
            let hum_version_id = HUM_VERSION_RE
                .find(&version_text)
                .map(|m| m.as_str().to_string())
                .unwrap_or(version_text);
            let rec = RawReleaseRow {
                hum_version_id,
                release_date: html::element_text(row[1]),
                content: html::element_text_with_breaks(row[2]),
            };
            let all_empty = super::is_ignorable_text(&rec.hum_version_id)
                && super::is_ignorable_text(&rec.release_date)
                && super::is_ignorable_text(&rec.content);
            (!all_empty).then_some(rec)
        })
        .collect()
}

fn is_header_row(row: &[ElementRef]) -> bool {
    row.iter().any(|c| {
        let norm = normalize_for_match(&html::element_text(*c));
        norm.contains("公開日") || norm.contains("release date") || norm.contains("バージョン")
    })
}
