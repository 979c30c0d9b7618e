//! Bilingual merging: pairs the Japanese and English renditions of each
//! entity list into unified records. Pairing runs in tiers per list —
//! exact key (dataset-ID overlap, DOI, URL), then fuzzy text, then a
//! positional fallback pairing the leftovers by index order. Every
//! merged record carries the `MatchType` that produced it; an
//! `unmatched-ja` record never carries an English side and vice versa.

use crate::model::*;
use crate::textutil::normalize_for_match;
use crate::transform::TransformOutput;

// ── Generic tiered pairing ──

struct Paired<'a, T> {
    match_type: MatchType,
    ja: Option<&'a T>,
    en: Option<&'a T>,
}

/// Greedy first-match pairing. Japanese order is preserved; English
/// records that stay unpaired are appended afterwards.
fn pair_items<'a, T>(
    ja: &'a [T],
    en: &'a [T],
    exact: impl Fn(&T, &T) -> bool,
    fuzzy: impl Fn(&T, &T) -> bool,
) -> Vec<Paired<'a, T>> {
    let mut en_used = vec![false; en.len()];
    let mut ja_match: Vec<Option<(usize, MatchType)>> = vec![None; ja.len()];

    for (i, j) in ja.iter().enumerate() {
        for (k, e) in en.iter().enumerate() {
            if !en_used[k] && exact(j, e) {
                ja_match[i] = Some((k, MatchType::Exact));
                en_used[k] = true;
                break;
            }
        }
    }
    for (i, j) in ja.iter().enumerate() {
        if ja_match[i].is_some() {
            continue;
        }
        for (k, e) in en.iter().enumerate() {
            if !en_used[k] && fuzzy(j, e) {
                ja_match[i] = Some((k, MatchType::Fuzzy));
                en_used[k] = true;
                break;
            }
        }
    }

    // Leftovers pair by index order; the excess on either side stays
    // unmatched.
    let ja_left: Vec<usize> = (0..ja.len()).filter(|i| ja_match[*i].is_none()).collect();
    let en_left: Vec<usize> = (0..en.len()).filter(|k| !en_used[*k]).collect();
    for (&i, &k) in ja_left.iter().zip(&en_left) {
        ja_match[i] = Some((k, MatchType::Position));
        en_used[k] = true;
    }

    let mut out = Vec::with_capacity(ja.len() + en.len());
    for (i, j) in ja.iter().enumerate() {
        match ja_match[i] {
            Some((k, match_type)) => out.push(Paired {
                match_type,
                ja: Some(j),
                en: Some(&en[k]),
            }),
            None => out.push(Paired {
                match_type: MatchType::UnmatchedJa,
                ja: Some(j),
                en: None,
            }),
        }
    }
    for (k, e) in en.iter().enumerate() {
        if !en_used[k] {
            out.push(Paired {
                match_type: MatchType::UnmatchedEn,
                ja: None,
                en: Some(e),
            });
        }
    }
    out
}

/// Normalized-substring containment, or a shared token of five or more
/// characters. Accession-bearing headers usually meet the second form.
fn fuzzy_text(a: &str, b: &str) -> bool {
    let a = normalize_for_match(a);
    let b = normalize_for_match(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }
    a.split_whitespace()
        .filter(|t| t.len() >= 5)
        .any(|t| b.split_whitespace().any(|u| u == t))
}

fn ids_overlap(a: &[String], b: &[String]) -> bool {
    a.iter().any(|id| b.contains(id))
}

fn union_ids(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for id in b {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

fn prefer_nonempty<T: Clone>(a: Option<&[T]>, b: Option<&[T]>) -> Vec<T> {
    match a {
        Some(v) if !v.is_empty() => v.to_vec(),
        _ => b.map(|v| v.to_vec()).unwrap_or_default(),
    }
}

fn bilingual(ja: Option<String>, en: Option<String>) -> BilingualText {
    BilingualText { ja, en }
}

fn join_text_values(values: &[TextValue]) -> Option<TextValue> {
    if values.is_empty() {
        return None;
    }
    Some(TextValue {
        text: values
            .iter()
            .map(|v| v.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        raw_html: values
            .iter()
            .map(|v| v.raw_html.as_str())
            .collect::<Vec<_>>()
            .join(""),
    })
}

// ── Experiments ──

fn experiment_side(exp: &SingleLangExperiment) -> ExperimentSide {
    ExperimentSide {
        header: exp.header.clone(),
        data: exp.data.clone(),
        footers: exp.footers.clone(),
    }
}

pub fn merge_experiments(
    ja: &[SingleLangExperiment],
    en: &[SingleLangExperiment],
) -> Vec<UnifiedExperiment> {
    pair_items(
        ja,
        en,
        |j, e| ids_overlap(&j.dataset_ids, &e.dataset_ids),
        |j, e| fuzzy_text(&j.header.text, &e.header.text),
    )
    .into_iter()
    .map(|p| {
        UnifiedExperiment {
            match_type: p.match_type,
            dataset_ids: union_ids(
                p.ja.map(|j| j.dataset_ids.as_slice()).unwrap_or(&[]),
                p.en.map(|e| e.dataset_ids.as_slice()).unwrap_or(&[]),
            ),
            ja: p.ja.map(experiment_side),
            en: p.en.map(experiment_side),
            type_of_data: bilingual(
                p.ja.and_then(|j| j.type_of_data.clone()),
                p.en.and_then(|e| e.type_of_data.clone()),
            ),
            criteria: prefer_nonempty(
                p.ja.map(|j| j.criteria.as_slice()),
                p.en.map(|e| e.criteria.as_slice()),
            ),
            release_dates: prefer_nonempty(
                p.ja.map(|j| j.release_dates.as_slice()),
                p.en.map(|e| e.release_dates.as_slice()),
            ),
            searchable: None,
        }
    })
    .collect()
}

// ── Datasets ──

pub fn merge_datasets(
    ja: &[SingleLangDataset],
    en: &[SingleLangDataset],
) -> Vec<UnifiedDataset> {
    let mut ids: Vec<&str> = ja.iter().map(|d| d.dataset_id.as_str()).collect();
    for d in en {
        if !ids.contains(&d.dataset_id.as_str()) {
            ids.push(&d.dataset_id);
        }
    }

    ids.into_iter()
        .map(|dataset_id| {
            let ja_ds = ja.iter().find(|d| d.dataset_id == dataset_id);
            let en_ds = en.iter().find(|d| d.dataset_id == dataset_id);
            let version = ja_ds
                .or(en_ds)
                .map(|d| d.version.clone())
                .unwrap_or_else(|| "v1".to_string());
            UnifiedDataset {
                dataset_id: dataset_id.to_string(),
                version,
                experiments: merge_experiments(
                    ja_ds.map(|d| d.experiments.as_slice()).unwrap_or(&[]),
                    en_ds.map(|d| d.experiments.as_slice()).unwrap_or(&[]),
                ),
            }
        })
        .collect()
}

// ── Publications ──

pub fn merge_publications(
    ja: &[NormalizedPublication],
    en: &[NormalizedPublication],
) -> Vec<UnifiedPublication> {
    pair_items(
        ja,
        en,
        |j, e| !j.doi.is_empty() && normalize_for_match(&j.doi) == normalize_for_match(&e.doi),
        |j, e| fuzzy_text(&j.title, &e.title) || ids_overlap(&j.dataset_ids, &e.dataset_ids),
    )
    .into_iter()
    .map(|p| UnifiedPublication {
        match_type: p.match_type,
        title: bilingual(
            p.ja.map(|j| j.title.clone()),
            p.en.map(|e| e.title.clone()),
        ),
        doi: p
            .ja
            .map(|j| j.doi.clone())
            .filter(|d| !d.is_empty())
            .or_else(|| p.en.map(|e| e.doi.clone()).filter(|d| !d.is_empty())),
        dataset_ids: union_ids(
            p.ja.map(|j| j.dataset_ids.as_slice()).unwrap_or(&[]),
            p.en.map(|e| e.dataset_ids.as_slice()).unwrap_or(&[]),
        ),
    })
    .collect()
}

// ── Grants ──

pub fn merge_grants(ja: &[RawGrant], en: &[RawGrant]) -> Vec<UnifiedGrant> {
    pair_items(
        ja,
        en,
        |j, e| ids_overlap(&j.grant_ids, &e.grant_ids),
        |j, e| fuzzy_text(&j.grant_name, &e.grant_name) || fuzzy_text(&j.title, &e.title),
    )
    .into_iter()
    .map(|p| UnifiedGrant {
        match_type: p.match_type,
        grant_name: bilingual(
            p.ja.map(|j| j.grant_name.clone()),
            p.en.map(|e| e.grant_name.clone()),
        ),
        title: bilingual(p.ja.map(|j| j.title.clone()), p.en.map(|e| e.title.clone())),
        grant_ids: union_ids(
            p.ja.map(|j| j.grant_ids.as_slice()).unwrap_or(&[]),
            p.en.map(|e| e.grant_ids.as_slice()).unwrap_or(&[]),
        ),
    })
    .collect()
}

// ── Controlled-access users ──

fn periods_compatible(a: Option<&Period>, b: Option<&Period>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

pub fn merge_controlled_access_users(
    ja: &[NormalizedControlledAccessUser],
    en: &[NormalizedControlledAccessUser],
) -> Vec<UnifiedControlledAccessUser> {
    pair_items(
        ja,
        en,
        |j, e| {
            ids_overlap(&j.dataset_ids, &e.dataset_ids)
                && periods_compatible(j.period_of_data_use.as_ref(), e.period_of_data_use.as_ref())
        },
        |j, e| match (&j.affiliation, &e.affiliation) {
            (Some(a), Some(b)) => fuzzy_text(a, b),
            _ => false,
        },
    )
    .into_iter()
    .map(|p| UnifiedControlledAccessUser {
        match_type: p.match_type,
        principal_investigator: bilingual(
            p.ja.and_then(|j| j.principal_investigator.clone()),
            p.en.and_then(|e| e.principal_investigator.clone()),
        ),
        affiliation: bilingual(
            p.ja.and_then(|j| j.affiliation.clone()),
            p.en.and_then(|e| e.affiliation.clone()),
        ),
        country: p
            .en
            .and_then(|e| e.country.clone())
            .or_else(|| p.ja.and_then(|j| j.country.clone())),
        research_title: bilingual(
            p.ja.and_then(|j| j.research_title.clone()),
            p.en.and_then(|e| e.research_title.clone()),
        ),
        dataset_ids: union_ids(
            p.ja.map(|j| j.dataset_ids.as_slice()).unwrap_or(&[]),
            p.en.map(|e| e.dataset_ids.as_slice()).unwrap_or(&[]),
        ),
        period_of_data_use: p
            .ja
            .and_then(|j| j.period_of_data_use.clone())
            .or_else(|| p.en.and_then(|e| e.period_of_data_use.clone())),
    })
    .collect()
}

// ── Research projects ──

fn merge_research_projects(
    ja: &NormalizedDataProvider,
    en: &NormalizedDataProvider,
) -> Vec<UnifiedResearchProject> {
    let ja_name = ja.project_name.as_ref().map(|v| v.text.clone());
    let en_name = en.project_name.as_ref().map(|v| v.text.clone());
    match (ja_name, en_name) {
        (None, None) => Vec::new(),
        (ja_name @ Some(_), en_name @ Some(_)) => {
            let match_type = match (&ja.project_url, &en.project_url) {
                (Some(a), Some(b)) if a == b => MatchType::Exact,
                _ => MatchType::Position,
            };
            vec![UnifiedResearchProject {
                match_type,
                name: bilingual(ja_name, en_name),
                url: ja.project_url.clone().or_else(|| en.project_url.clone()),
            }]
        }
        (ja_name @ Some(_), None) => vec![UnifiedResearchProject {
            match_type: MatchType::UnmatchedJa,
            name: bilingual(ja_name, None),
            url: ja.project_url.clone(),
        }],
        (None, en_name @ Some(_)) => vec![UnifiedResearchProject {
            match_type: MatchType::UnmatchedEn,
            name: bilingual(None, en_name),
            url: en.project_url.clone(),
        }],
    }
}

// ── Release versions ──

fn merge_versions(ja: &[ResearchVersion], en: &[ResearchVersion]) -> Vec<ResearchVersion> {
    let mut out: Vec<ResearchVersion> = ja.to_vec();
    for e in en {
        match out.iter_mut().find(|v| v.hum_version_id == e.hum_version_id) {
            Some(v) => {
                v.content.en = e.content.en.clone();
                if v.release_date.is_none() {
                    v.release_date = e.release_date.clone();
                }
                v.dataset_ids = union_ids(&v.dataset_ids, &e.dataset_ids);
                v.dataset_ids.sort();
            }
            None => out.push(e.clone()),
        }
    }
    out
}

// ── Whole research entry ──

fn merge_summary(ja: &NormalizedSummary, en: &NormalizedSummary) -> UnifiedSummary {
    UnifiedSummary {
        aims: BilingualTextValue {
            ja: join_text_values(&ja.aims),
            en: join_text_values(&en.aims),
        },
        methods: BilingualTextValue {
            ja: join_text_values(&ja.methods),
            en: join_text_values(&en.methods),
        },
        targets: BilingualTextValue {
            ja: join_text_values(&ja.targets),
            en: join_text_values(&en.targets),
        },
        urls_ja: ja.urls.clone(),
        urls_en: en.urls.clone(),
    }
}

/// Merge the two language renditions of one research entry. A missing
/// English side leaves every record `unmatched-ja`.
pub fn merge_research(ja: &TransformOutput, en: Option<&TransformOutput>) -> UnifiedResearch {
    let empty_provider = NormalizedDataProvider::default();
    let empty_summary = NormalizedSummary::default();

    let en_research = en.map(|e| &e.research);
    let en_provider = en_research.map(|r| &r.data_provider).unwrap_or(&empty_provider);
    let en_summary = en_research.map(|r| &r.summary).unwrap_or(&empty_summary);

    UnifiedResearch {
        hum_id: ja.research.hum_id.clone(),
        summary: merge_summary(&ja.research.summary, en_summary),
        principal_investigator: bilingual(
            ja.research
                .data_provider
                .principal_investigator
                .as_ref()
                .map(|v| v.text.clone()),
            en_provider.principal_investigator.as_ref().map(|v| v.text.clone()),
        ),
        affiliation: bilingual(
            ja.research.data_provider.affiliation.as_ref().map(|v| v.text.clone()),
            en_provider.affiliation.as_ref().map(|v| v.text.clone()),
        ),
        research_projects: merge_research_projects(&ja.research.data_provider, en_provider),
        grants: merge_grants(
            &ja.research.data_provider.grants,
            en_provider.grants.as_slice(),
        ),
        datasets: merge_datasets(
            &ja.datasets,
            en.map(|e| e.datasets.as_slice()).unwrap_or(&[]),
        ),
        publications: merge_publications(
            &ja.research.publications,
            en_research.map(|r| r.publications.as_slice()).unwrap_or(&[]),
        ),
        controlled_access_users: merge_controlled_access_users(
            &ja.research.controlled_access_users,
            en_research
                .map(|r| r.controlled_access_users.as_slice())
                .unwrap_or(&[]),
        ),
        versions: merge_versions(
            &ja.versions,
            en.map(|e| e.versions.as_slice()).unwrap_or(&[]),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(header: &str, ids: &[&str]) -> SingleLangExperiment {
        SingleLangExperiment {
            header: TextValue::from_text(header),
            dataset_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn shared_dataset_id_matches_exactly() {
        let merged = merge_experiments(
            &[exp("JGAD000001 全ゲノム", &["JGAD000001"])],
            &[exp("JGAD000001 WGS", &["JGAD000001"])],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, MatchType::Exact);
        assert!(merged[0].ja.is_some());
        assert!(merged[0].en.is_some());
    }

    #[test]
    fn fuzzy_header_match_when_ids_absent() {
        let merged = merge_experiments(
            &[exp("NGS (Target Capture) データ", &[])],
            &[exp("NGS (Target Capture)", &[])],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, MatchType::Fuzzy);
    }

    #[test]
    fn equal_leftovers_pair_by_position() {
        let merged = merge_experiments(
            &[exp("表一", &[]), exp("表二", &[])],
            &[exp("table one", &[]), exp("table two", &[])],
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.match_type == MatchType::Position));
    }

    #[test]
    fn unequal_leftovers_pair_by_index() {
        let merged = merge_experiments(
            &[exp("表一", &[]), exp("表二", &[])],
            &[exp("table one", &[])],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].match_type, MatchType::Position);
        assert!(merged[0].en.is_some());
        assert_eq!(merged[1].match_type, MatchType::UnmatchedJa);
        assert!(merged[1].en.is_none());
    }

    #[test]
    fn unmatched_ja_has_no_english_side() {
        let merged = merge_experiments(
            &[exp("JGAD000001", &["JGAD000001"]), exp("追加の表", &[])],
            &[exp("JGAD000001", &["JGAD000001"])],
        );
        assert_eq!(merged.len(), 2);
        let lone = merged.iter().find(|m| m.match_type == MatchType::UnmatchedJa).unwrap();
        assert!(lone.en.is_none());
        assert!(lone.type_of_data.en.is_none());
    }

    #[test]
    fn english_only_experiment_survives_as_unmatched_en() {
        let merged = merge_experiments(&[], &[exp("extra", &[])]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, MatchType::UnmatchedEn);
        assert!(merged[0].ja.is_none());
    }

    #[test]
    fn publications_match_by_doi() {
        let ja = vec![NormalizedPublication {
            title: "論文A".into(),
            doi: "10.1000/a".into(),
            dataset_ids: vec!["JGAD000001".into()],
        }];
        let en = vec![NormalizedPublication {
            title: "Paper A".into(),
            doi: "10.1000/A".into(),
            dataset_ids: vec!["JGAD000002".into()],
        }];
        let merged = merge_publications(&ja, &en);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, MatchType::Exact);
        assert_eq!(merged[0].title.ja.as_deref(), Some("論文A"));
        assert_eq!(merged[0].title.en.as_deref(), Some("Paper A"));
        assert_eq!(merged[0].dataset_ids, vec!["JGAD000001", "JGAD000002"]);
    }

    #[test]
    fn grants_match_by_grant_id_overlap() {
        let ja = vec![RawGrant {
            grant_name: "科研費".into(),
            title: "課題X".into(),
            grant_ids: vec!["17H00000".into()],
        }];
        let en = vec![RawGrant {
            grant_name: "KAKENHI".into(),
            title: "Project X".into(),
            grant_ids: vec!["17H00000".into()],
        }];
        let merged = merge_grants(&ja, &en);
        assert_eq!(merged[0].match_type, MatchType::Exact);
        assert_eq!(merged[0].grant_ids, vec!["17H00000"]);
    }

    #[test]
    fn cau_dataset_overlap_with_conflicting_period_is_not_exact() {
        let period = |s: &str, e: &str| Period {
            start_date: s.into(),
            end_date: e.into(),
        };
        let ja = vec![NormalizedControlledAccessUser {
            principal_investigator: Some("山田 太郎".into()),
            dataset_ids: vec!["JGAD000001".into()],
            period_of_data_use: Some(period("2020-01-01", "2021-12-31")),
            ..Default::default()
        }];
        let en = vec![NormalizedControlledAccessUser {
            principal_investigator: Some("Taro Yamada".into()),
            dataset_ids: vec!["JGAD000001".into()],
            period_of_data_use: Some(period("2022-01-01", "2023-12-31")),
            ..Default::default()
        }];
        let merged = merge_controlled_access_users(&ja, &en);
        assert_eq!(merged.len(), 1);
        // One leftover on each side, so the positional tier pairs them.
        assert_eq!(merged[0].match_type, MatchType::Position);
    }

    #[test]
    fn versions_merge_by_hum_version_id() {
        let mk = |id: &str, ja: Option<&str>, en: Option<&str>| ResearchVersion {
            hum_id: "hum0001".into(),
            hum_version_id: id.into(),
            release_date: Some("2020-06-15".into()),
            content: BilingualText {
                ja: ja.map(String::from),
                en: en.map(String::from),
            },
            dataset_ids: vec!["JGAD000001".into()],
        };
        let merged = merge_versions(
            &[mk("hum0001-v1", Some("初回公開"), None)],
            &[mk("hum0001-v1", None, Some("First release"))],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content.ja.as_deref(), Some("初回公開"));
        assert_eq!(merged[0].content.en.as_deref(), Some("First release"));
    }
}
