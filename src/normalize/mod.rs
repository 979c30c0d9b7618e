//! Value normalization: total pure functions that interpret raw cell
//! strings (criteria, dates, grant ids, periods) plus the pass that
//! lifts a whole `RawParseResult` into its normalized form. Nothing in
//! here panics on unexpected input; unrecognizable values become
//! absent with a logged warning.

pub mod dataset_id;

use std::sync::LazyLock;

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

use crate::lookup;
use crate::model::*;
use crate::resolver::{AccessionResolver, CachedResolver};
use crate::textutil::{collapse_ws, normalize_for_match, to_half_width};

static SLASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").unwrap());
static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static PERIOD_ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})-(\d{4}-\d{2}-\d{2})$").unwrap());
static PERIOD_SLASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}/\d{1,2}/\d{1,2})-(\d{4}/\d{1,2}/\d{1,2})$").unwrap()
});

/// Literals meaning "not released yet" in either language.
const COMING_SOON: &[&str] = &["coming soon", "近日公開"];

/// Split a multi-value criteria cell and map every token through the
/// canonical table. Unknown tokens are dropped with a warning, never
/// defaulted.
pub fn normalize_criteria(cell: &str) -> Vec<Criteria> {
    cell.split(['\n', ',', '、', '，', '/'])
        .map(collapse_ws)
        .filter(|t| !t.is_empty() && !lookup::is_empty_marker(t))
        .filter_map(|t| match lookup::criteria_for_token(&t) {
            Some(c) => Some(c),
            None => {
                warn!(token = %t, "unrecognized criteria token");
                None
            }
        })
        .collect()
}

/// `YYYY/M/D` → `YYYY-MM-DD`. Already-ISO input passes through, so the
/// function is idempotent. Anything unparsable is absent.
pub fn fix_date(s: &str) -> Option<String> {
    let s = collapse_ws(&to_half_width(s));
    if ISO_DATE_RE.is_match(&s) {
        return NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok().map(|_| s);
    }
    let caps = SLASH_DATE_RE.captures(&s)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Normalize one release-date cell: "coming soon" (either language)
/// means absent, and every space-separated date in the cell converts.
pub fn fix_release_date(cell: &str) -> Vec<String> {
    let norm = normalize_for_match(cell);
    if COMING_SOON.iter().any(|m| norm.contains(m)) {
        return Vec::new();
    }
    to_half_width(cell)
        .split_whitespace()
        .filter_map(fix_date)
        .collect()
}

/// Grant-ID cleanup: drop invalid-list values, convert full-width
/// alphanumerics/dashes/spaces to half-width, collapse whitespace.
pub fn fix_grant_id(s: &str) -> Option<String> {
    let cleaned = collapse_ws(&to_half_width(s));
    if cleaned.is_empty() || lookup::is_empty_marker(&cleaned) {
        return None;
    }
    let norm = normalize_for_match(&cleaned);
    if lookup::INVALID_GRANT_VALUES.iter().any(|v| normalize_for_match(v) == norm) {
        return None;
    }
    Some(cleaned)
}

/// Parse `YYYY-MM-DD-YYYY-MM-DD` or `YYYY/M/D-YYYY/M/D` into a period.
/// Anything else is absent, not an error.
pub fn parse_period(s: &str) -> Option<Period> {
    let s = collapse_ws(&to_half_width(s)).replace(' ', "");
    if let Some(caps) = PERIOD_ISO_RE.captures(&s) {
        return Some(Period {
            start_date: fix_date(&caps[1])?,
            end_date: fix_date(&caps[2])?,
        });
    }
    let caps = PERIOD_SLASH_RE.captures(&s)?;
    Some(Period {
        start_date: fix_date(&caps[1])?,
        end_date: fix_date(&caps[2])?,
    })
}

/// Interpret every string-typed leaf of one raw page. Dataset-ID
/// handling suspends on the accession resolver; all other work is
/// pure.
pub async fn normalize_parse_result<R: AccessionResolver>(
    raw: &RawParseResult,
    resolver: &CachedResolver<R>,
) -> Result<NormalizedParseResult> {
    let hum_id = &raw.hum_id;

    let mut datasets = Vec::with_capacity(raw.summary.datasets.len());
    for row in &raw.summary.datasets {
        datasets.push(NormalizedSummaryDataset {
            dataset_ids: dataset_id::process_dataset_id(hum_id, &row.dataset_id, resolver)
                .await?,
            type_of_data: collapse_ws(&row.type_of_data),
            criteria: normalize_criteria(&row.criteria),
            release_dates: fix_release_date(&row.release_date),
        });
    }

    let mut publications = Vec::with_capacity(raw.publications.len());
    for p in &raw.publications {
        // Cells can repeat an id non-adjacently, so keep first-seen
        // order instead of Vec::dedup.
        let mut ids: Vec<String> = Vec::new();
        for raw_id in &p.dataset_ids {
            for id in dataset_id::process_dataset_id(hum_id, raw_id, resolver).await? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        publications.push(NormalizedPublication {
            title: p.title.clone(),
            doi: p.doi.clone(),
            dataset_ids: ids,
        });
    }

    let mut users = Vec::with_capacity(raw.controlled_access_users.len());
    for u in &raw.controlled_access_users {
        let mut ids: Vec<String> = Vec::new();
        for raw_id in &u.dataset_ids {
            for id in dataset_id::process_dataset_id(hum_id, raw_id, resolver).await? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        users.push(NormalizedControlledAccessUser {
            principal_investigator: u.principal_investigator.clone(),
            affiliation: u.affiliation.clone(),
            country: u.country.clone(),
            research_title: u.research_title.clone(),
            dataset_ids: ids,
            period_of_data_use: u.period_of_data_use.as_deref().and_then(parse_period),
        });
    }

    let grants = raw
        .data_provider
        .grants
        .iter()
        .map(|g| RawGrant {
            grant_name: collapse_ws(&g.grant_name),
            title: collapse_ws(&g.title),
            grant_ids: g.grant_ids.iter().filter_map(|id| fix_grant_id(id)).collect(),
        })
        .collect();

    let releases = NormalizedRelease {
        rows: raw
            .releases
            .rows
            .iter()
            .map(|r| NormalizedReleaseRow {
                hum_version_id: r.hum_version_id.clone(),
                release_date: fix_date(&r.release_date),
                content: r.content.clone(),
            })
            .collect(),
        notes: raw.releases.notes.clone(),
    };

    Ok(NormalizedParseResult {
        hum_id: raw.hum_id.clone(),
        lang: raw.lang,
        summary: NormalizedSummary {
            aims: raw.summary.aims.clone(),
            methods: raw.summary.methods.clone(),
            targets: raw.summary.targets.clone(),
            urls: raw.summary.urls.clone(),
            datasets,
            footers: raw.summary.footers.clone(),
        },
        molecular_data: raw.molecular_data.clone(),
        data_provider: NormalizedDataProvider {
            principal_investigator: raw.data_provider.principal_investigator.clone(),
            affiliation: raw.data_provider.affiliation.clone(),
            project_name: raw.data_provider.project_name.clone(),
            project_url: raw.data_provider.project_url.clone(),
            grants,
        },
        publications,
        controlled_access_users: users,
        releases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_single_token() {
        assert_eq!(normalize_criteria("非制限公開"), vec![Criteria::Unrestricted]);
    }

    #[test]
    fn criteria_multi_value_cell() {
        let c = normalize_criteria("制限公開（Type I）、非制限公開");
        assert_eq!(
            c,
            vec![Criteria::ControlledAccessTypeI, Criteria::Unrestricted]
        );
    }

    #[test]
    fn criteria_unknown_token_dropped() {
        assert!(normalize_criteria("限定公開").is_empty());
    }

    #[test]
    fn date_slash_to_iso() {
        assert_eq!(fix_date("2024/1/5").as_deref(), Some("2024-01-05"));
        assert_eq!(fix_date("2024/12/31").as_deref(), Some("2024-12-31"));
    }

    #[test]
    fn date_is_idempotent() {
        let once = fix_date("2024/1/5").unwrap();
        assert_eq!(fix_date(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn date_garbage_absent() {
        assert!(fix_date("2024/13/40").is_none());
        assert!(fix_date("not a date").is_none());
    }

    #[test]
    fn release_date_coming_soon_absent() {
        assert!(fix_release_date("Coming soon").is_empty());
        assert!(fix_release_date("近日公開").is_empty());
    }

    #[test]
    fn release_date_multiple_dates() {
        assert_eq!(
            fix_release_date("2024/1/5 2024/3/10"),
            vec!["2024-01-05", "2024-03-10"]
        );
    }

    #[test]
    fn grant_id_full_width_and_invalid() {
        assert_eq!(
            fix_grant_id("ＪＰ１８ｋｍ０１０５００１").as_deref(),
            Some("JP18km0105001")
        );
        assert!(fix_grant_id("なし").is_none());
        assert!(fix_grant_id("  ").is_none());
    }

    #[test]
    fn period_both_formats() {
        let p = parse_period("2016/4/1-2019/3/31").unwrap();
        assert_eq!(p.start_date, "2016-04-01");
        assert_eq!(p.end_date, "2019-03-31");
        let p = parse_period("2016-04-01-2019-03-31").unwrap();
        assert_eq!(p.start_date, "2016-04-01");
    }

    #[test]
    fn period_garbage_absent() {
        assert!(parse_period("during the project").is_none());
        assert!(parse_period("").is_none());
    }

    #[tokio::test]
    async fn publication_ids_unique_across_cells() {
        let raw = RawParseResult {
            hum_id: "hum0001".into(),
            lang: Lang::Ja,
            summary: Default::default(),
            molecular_data: Vec::new(),
            data_provider: Default::default(),
            publications: vec![RawPublication {
                title: "paper".into(),
                doi: "10.1/x".into(),
                dataset_ids: vec![
                    "JGAD000001".into(),
                    "JGAD000002".into(),
                    "JGAD000001".into(),
                ],
            }],
            controlled_access_users: Vec::new(),
            releases: Default::default(),
        };
        let resolver = CachedResolver::new(crate::resolver::StaticResolver::empty());
        let norm = normalize_parse_result(&raw, &resolver).await.unwrap();
        assert_eq!(
            norm.publications[0].dataset_ids,
            vec!["JGAD000001", "JGAD000002"]
        );
    }
}
