//! Dataset-ID interpretation: annotation stripping, known-bad-spelling
//! substitution, legacy family conversion, JGAD range expansion and
//! study→dataset expansion through the accession resolver.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};

use crate::extract_ids;
use crate::lookup;
use crate::model::DatasetIdType;
use crate::resolver::{AccessionResolver, CachedResolver};
use crate::textutil::{collapse_ws, to_half_width};

static PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(][^）)]*[）)]").unwrap());
static JGAD_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^JGAD(\d{6})-JGAD(\d{6})$").unwrap());
static LEGACY_JGA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^JGA(\d{6})$").unwrap());
static LEGACY_GEA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^E-GEA-(\d+)$").unwrap());

/// Strip annotations and apply exact-string substitutions, then split
/// one cell's worth of text on whitespace. Idempotent.
pub fn fix_dataset_id(cell: &str) -> Vec<String> {
    let mut s = to_half_width(cell);
    s = PAREN_RE.replace_all(&s, " ").into_owned();
    for phrase in lookup::DATASET_ANNOTATIONS {
        s = s.replace(phrase, " ");
    }
    let s = collapse_ws(&s);

    s.split_whitespace()
        .map(|tok| {
            lookup::DATASET_ID_SUBSTITUTIONS
                .iter()
                .find(|(bad, _)| *bad == tok)
                .map(|(_, good)| good.to_string())
                .unwrap_or_else(|| tok.to_string())
        })
        .filter(|tok| !lookup::is_empty_marker(tok))
        .collect()
}

/// Split a dataset-ID cell on newline, comma and ideographic comma,
/// then strip annotations/empty markers per token. Shared by the
/// publications and controlled-access-users parsers.
pub fn split_dataset_cell(text: &str) -> Vec<String> {
    text.split(['\n', ',', '、', '，'])
        .flat_map(fix_dataset_id)
        .collect()
}

/// Expand `JGAD######-JGAD######` into the enumerated sequence.
/// A reversed range (start > end) is left untouched rather than
/// guessed at.
pub fn expand_jgad_range(s: &str) -> Vec<String> {
    let Some(caps) = JGAD_RANGE_RE.captures(s) else {
        return vec![s.to_string()];
    };
    let start: u32 = caps[1].parse().unwrap_or(0);
    let end: u32 = caps[2].parse().unwrap_or(0);
    if start > end {
        return vec![s.to_string()];
    }
    (start..=end).map(|n| format!("JGAD{:06}", n)).collect()
}

/// Rewrite legacy/alternate accession spellings into their canonical
/// family form. Unrecognized forms pass through unchanged.
pub fn convert_family(id: &str) -> String {
    if let Some(caps) = LEGACY_JGA_RE.captures(id) {
        return format!("JGAD{}", &caps[1]);
    }
    if let Some(caps) = LEGACY_GEA_RE.captures(id) {
        return format!("E-GEAD-{}", &caps[1]);
    }
    id.to_string()
}

/// Fix the documented JGAD-written-for-JGAS typos.
fn fix_jgas_typo(id: &str) -> String {
    if lookup::JGAD_TYPO_AS_JGAS.contains(&id) {
        return id.replacen("JGAD", "JGAS", 1);
    }
    id.to_string()
}

fn is_invalid(id: &str) -> bool {
    lookup::INVALID_DATASET_VALUES.contains(&id)
}

/// Full dataset-ID pipeline for one raw cell token:
/// per-page override → typo correction → substitution/annotation fix →
/// family conversion → range expansion → study→dataset expansion.
/// The result is deduped preserving first-seen order; re-running the
/// pipeline on its own output yields the same set.
pub async fn process_dataset_id<R: AccessionResolver>(
    hum_id: &str,
    raw: &str,
    resolver: &CachedResolver<R>,
) -> Result<Vec<String>> {
    if let Some((_, _, replacement)) = lookup::DATASET_ID_OVERRIDES
        .iter()
        .find(|(page, bad, _)| *page == hum_id && *bad == raw.trim())
    {
        debug!(hum_id, raw, "dataset-id override applied");
        return Ok(replacement.iter().map(|s| s.to_string()).collect());
    }

    let mut expanded: Vec<String> = Vec::new();
    for tok in fix_dataset_id(raw) {
        let tok = fix_jgas_typo(&tok);
        let tok = convert_family(&tok);
        for id in expand_jgad_range(&tok) {
            if extract_ids::classify_id(&id) == Some(DatasetIdType::Jgas) {
                let members = resolver.resolve(&id).await?;
                if members.is_empty() {
                    expanded.push(id);
                } else {
                    expanded.extend(members.iter().cloned());
                }
            } else {
                expanded.push(id);
            }
        }
    }

    let mut out: Vec<String> = Vec::new();
    for id in expanded {
        if is_invalid(&id) {
            warn!(hum_id, id, "dropping invalid dataset id");
            continue;
        }
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}
