//! Process-wide lookup tables: section headings, field labels, the
//! criteria map, empty markers, invalid-value lists and the narrow
//! per-page hotfix tables. All of it is immutable, loaded once, and
//! handed to the parsers as explicit parameters so every normalization
//! function stays unit-testable without environment setup.
//!
//! Dispatch tables are ordered `(pattern, tag)` lists evaluated
//! top-to-bottom; first match wins and "no match" is a valid outcome.

use std::sync::LazyLock;

use crate::model::{Criteria, RawControlledAccessUser};
use crate::textutil::normalize_for_match;

/// Named sections a detail page splits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Summary,
    MolecularData,
    DataProvider,
    Publications,
    ControlledAccessUsers,
    // Rare variants seen on a handful of older pages.
    StudyList,
    DataList,
}

/// Bilingual heading table. Matched against the width/case-normalized
/// heading text; substring match so decorations («1. 概要» etc.) pass.
const SECTION_HEADINGS: &[(&str, SectionKind)] = &[
    ("概要", SectionKind::Summary),
    ("summary", SectionKind::Summary),
    ("aims", SectionKind::Summary),
    ("分子データ", SectionKind::MolecularData),
    ("molecular data", SectionKind::MolecularData),
    ("提供者情報", SectionKind::DataProvider),
    ("data provider", SectionKind::DataProvider),
    ("発表論文", SectionKind::Publications),
    ("publications", SectionKind::Publications),
    ("制限公開データの利用者一覧", SectionKind::ControlledAccessUsers),
    ("data users (controlled-access data)", SectionKind::ControlledAccessUsers),
    ("controlled-access data users", SectionKind::ControlledAccessUsers),
    ("研究一覧", SectionKind::StudyList),
    ("study list", SectionKind::StudyList),
    ("データ一覧", SectionKind::DataList),
    ("data list", SectionKind::DataList),
];

/// Classify one heading's text, or None for unrecognized headings.
pub fn section_kind_for_heading(heading: &str) -> Option<SectionKind> {
    let norm = normalize_for_match(heading);
    if norm.is_empty() {
        return None;
    }
    SECTION_HEADINGS
        .iter()
        .find(|(pat, _)| norm.contains(pat))
        .map(|(_, kind)| *kind)
}

/// Strict variant for heading-styled paragraphs: the whole normalized
/// text (minus leading numbering) must equal a section name, so short
/// body paragraphs never masquerade as headings.
pub fn section_kind_for_heading_exact(heading: &str) -> Option<SectionKind> {
    let norm = normalize_for_match(heading);
    let trimmed =
        norm.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ');
    SECTION_HEADINGS
        .iter()
        .find(|(pat, _)| trimmed == *pat)
        .map(|(_, kind)| *kind)
}

/// Free-text fields of the summary section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Aims,
    Methods,
    Targets,
    Url,
}

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("目的", SummaryField::Aims),
    ("aims", SummaryField::Aims),
    ("aim", SummaryField::Aims),
    ("方法", SummaryField::Methods),
    ("methods", SummaryField::Methods),
    ("method", SummaryField::Methods),
    ("対象", SummaryField::Targets),
    ("participants/materials", SummaryField::Targets),
    ("participants", SummaryField::Targets),
    ("materials", SummaryField::Targets),
    ("targets", SummaryField::Targets),
    ("url", SummaryField::Url),
];

/// Match a bold label («目的：», "Methods:") to its summary field.
pub fn summary_field_for_label(label: &str) -> Option<SummaryField> {
    let norm = normalize_for_match(crate::textutil::strip_trailing_punct(label));
    if norm.is_empty() {
        return None;
    }
    SUMMARY_LABELS
        .iter()
        .find(|(pat, _)| norm == *pat || norm.starts_with(pat))
        .map(|(_, field)| *field)
}

/// Leading paragraphs of the data-provider section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderField {
    PrincipalInvestigator,
    Affiliation,
    ProjectName,
    ProjectUrl,
}

/// Label-prefix rules, including historical spelling variants still
/// live on older pages.
const PROVIDER_LABELS: &[(&str, ProviderField)] = &[
    ("研究代表者", ProviderField::PrincipalInvestigator),
    ("代表者", ProviderField::PrincipalInvestigator),
    ("principal investigator", ProviderField::PrincipalInvestigator),
    ("representative", ProviderField::PrincipalInvestigator),
    ("所属機関", ProviderField::Affiliation),
    ("所 属", ProviderField::Affiliation),
    ("所属", ProviderField::Affiliation),
    ("affiliation", ProviderField::Affiliation),
    ("プロジェクト/研究グループ名", ProviderField::ProjectName),
    ("プロジェクト名", ProviderField::ProjectName),
    ("研究グループ名", ProviderField::ProjectName),
    ("project/group name", ProviderField::ProjectName),
    ("project / group name", ProviderField::ProjectName),
    ("project name", ProviderField::ProjectName),
    ("url", ProviderField::ProjectUrl),
];

pub fn provider_field_for_label(label: &str) -> Option<ProviderField> {
    let norm = normalize_for_match(crate::textutil::strip_trailing_punct(label));
    if norm.is_empty() {
        return None;
    }
    PROVIDER_LABELS
        .iter()
        .find(|(pat, _)| norm.starts_with(pat))
        .map(|(_, field)| *field)
}

/// Columns of the controlled-access-users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CauField {
    PrincipalInvestigator,
    Affiliation,
    Country,
    ResearchTitle,
    DatasetIds,
    PeriodOfDataUse,
}

const CAU_HEADERS: &[(&str, CauField)] = &[
    ("研究代表者", CauField::PrincipalInvestigator),
    ("principal investigator", CauField::PrincipalInvestigator),
    ("所属機関", CauField::Affiliation),
    ("所属", CauField::Affiliation),
    ("affiliation", CauField::Affiliation),
    ("国・州名", CauField::Country),
    ("国名", CauField::Country),
    ("country", CauField::Country),
    ("研究題目", CauField::ResearchTitle),
    ("research title", CauField::ResearchTitle),
    ("利用データid", CauField::DatasetIds),
    ("利用データ", CauField::DatasetIds),
    ("dataset id", CauField::DatasetIds),
    ("data in use", CauField::DatasetIds),
    ("利用期間", CauField::PeriodOfDataUse),
    ("period of data use", CauField::PeriodOfDataUse),
];

pub fn cau_field_for_header(header: &str) -> Option<CauField> {
    let norm = normalize_for_match(header);
    if norm.is_empty() {
        return None;
    }
    CAU_HEADERS
        .iter()
        .find(|(pat, _)| norm.contains(pat))
        .map(|(_, field)| *field)
}

/// Criteria tokens in both languages, keyed by normalized match form.
const CRITERIA_TOKENS: &[(&str, Criteria)] = &[
    ("制限公開(type i)", Criteria::ControlledAccessTypeI),
    ("制限公開 (type i)", Criteria::ControlledAccessTypeI),
    ("controlled-access (type i)", Criteria::ControlledAccessTypeI),
    ("controlled-access(type i)", Criteria::ControlledAccessTypeI),
    ("controlled access (type i)", Criteria::ControlledAccessTypeI),
    ("制限公開(type ii)", Criteria::ControlledAccessTypeII),
    ("制限公開 (type ii)", Criteria::ControlledAccessTypeII),
    ("controlled-access (type ii)", Criteria::ControlledAccessTypeII),
    ("controlled-access(type ii)", Criteria::ControlledAccessTypeII),
    ("controlled access (type ii)", Criteria::ControlledAccessTypeII),
    ("非制限公開", Criteria::Unrestricted),
    ("unrestricted-access", Criteria::Unrestricted),
    ("unrestricted access", Criteria::Unrestricted),
];

/// Map one already-split criteria token onto the canonical enum.
/// Type II must be tried before Type I when matching by prefix, so the
/// lookup is exact on the normalized form.
pub fn criteria_for_token(token: &str) -> Option<Criteria> {
    let norm = normalize_for_match(token);
    CRITERIA_TOKENS
        .iter()
        .find(|(pat, _)| norm == *pat)
        .map(|(_, c)| *c)
}

/// Cell values that mean "nothing here" in either language.
const EMPTY_MARKERS: &[&str] = &[
    "-", "−", "ー", "―", "—", "なし", "無し", "none", "n/a", "na", "未定", "tbd",
];

pub fn is_empty_marker(s: &str) -> bool {
    let norm = normalize_for_match(s);
    norm.is_empty() || EMPTY_MARKERS.contains(&norm.as_str())
}

/// Values that must never survive as dataset IDs (resolver output and
/// cell text are both filtered through this).
pub const INVALID_DATASET_VALUES: &[&str] = &["JGAD000000", "JGAS000000"];

/// Values that must never survive as grant IDs.
pub const INVALID_GRANT_VALUES: &[&str] = &["なし", "無し", "none", "n/a", "-"];

/// Annotation phrases stripped from dataset-ID cells before splitting.
pub const DATASET_ANNOTATIONS: &[&str] = &[
    "予定",
    "公開予定",
    "準備中",
    "一部",
    "scheduled",
    "in preparation",
    "to be released",
    "partial",
];

/// Exact-string substitutions for known-bad accession spellings.
/// Deliberately narrow; grow this table, do not generalize the parser.
pub const DATASET_ID_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("JGAS00000000095", "JGAS000095"),
    ("JGAD0000000123", "JGAD000123"),
    ("DRA001273.", "DRA001273"),
];

/// JGAD ids that are actually study (JGAS) accessions written with the
/// wrong prefix on specific pages.
pub const JGAD_TYPO_AS_JGAS: &[&str] = &["JGAD000320", "JGAD000454"];

/// Per-page id overrides applied before any other dataset-id handling,
/// keyed by (humId, raw cell token).
pub const DATASET_ID_OVERRIDES: &[(&str, &str, &[&str])] = &[
    ("hum0009", "JGAS000025", &["JGAD000025", "JGAD000026"]),
    ("hum0064", "DRA004498 DRA004502", &["DRA004498", "DRA004502"]),
];

/// Explicit parent overrides for dataset-metadata inheritance, tried
/// before the longest-dot-prefix search.
pub const INHERITANCE_OVERRIDES: &[(&str, &str)] = &[
    ("hum0014.v3.CpG.v1", "hum0014.v3"),
    ("hum0031.v2.freq.v1", "hum0031.v1"),
];

/// Key of a pre-built controlled-access-user row: a page whose table
/// layout is too malformed for the generic parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CauHotfixKey {
    pub hum_id: String,
    pub cell_count: usize,
    pub first_cell: String,
}

/// Substitution records for known malformed controlled-access rows.
pub static CAU_HOTFIXES: LazyLock<Vec<(CauHotfixKey, RawControlledAccessUser)>> =
    LazyLock::new(|| {
        vec![
            (
                CauHotfixKey {
                    hum_id: "hum0031".into(),
                    cell_count: 5,
                    first_cell: "松田 文彦".into(),
                },
                RawControlledAccessUser {
                    principal_investigator: Some("松田 文彦".into()),
                    affiliation: Some("京都大学大学院医学研究科".into()),
                    country: None,
                    research_title: Some("ゲノム解析による疾患感受性の研究".into()),
                    dataset_ids: vec!["JGAD000031".into()],
                    period_of_data_use: Some("2016/4/1-2019/3/31".into()),
                },
            ),
            (
                CauHotfixKey {
                    hum_id: "hum0082".into(),
                    cell_count: 7,
                    first_cell: "Michael Smith".into(),
                },
                RawControlledAccessUser {
                    principal_investigator: Some("Michael Smith".into()),
                    affiliation: Some("University of British Columbia".into()),
                    country: Some("Canada".into()),
                    research_title: Some("Cross-population imputation reference panels".into()),
                    dataset_ids: vec!["JGAD000082".into()],
                    period_of_data_use: Some("2018/10/1-2020/9/30".into()),
                },
            ),
        ]
    });

/// Find a pre-built record for a malformed row, if one is registered.
pub fn cau_hotfix_for(
    hum_id: &str,
    cell_count: usize,
    first_cell: &str,
) -> Option<RawControlledAccessUser> {
    let first = crate::textutil::collapse_ws(first_cell);
    CAU_HOTFIXES
        .iter()
        .find(|(k, _)| {
            k.hum_id == hum_id && k.cell_count == cell_count && k.first_cell == first
        })
        .map(|(_, rec)| rec.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_lookup_both_languages() {
        assert_eq!(section_kind_for_heading("概要"), Some(SectionKind::Summary));
        assert_eq!(
            section_kind_for_heading("Molecular Data"),
            Some(SectionKind::MolecularData)
        );
        assert_eq!(
            section_kind_for_heading("２．分子データ"),
            Some(SectionKind::MolecularData)
        );
        assert_eq!(section_kind_for_heading("お知らせ"), None);
    }

    #[test]
    fn summary_label_with_punct_variants() {
        assert_eq!(summary_field_for_label("目的："), Some(SummaryField::Aims));
        assert_eq!(summary_field_for_label("Methods:"), Some(SummaryField::Methods));
        assert_eq!(summary_field_for_label("URL"), Some(SummaryField::Url));
        assert_eq!(summary_field_for_label("謝辞"), None);
    }

    #[test]
    fn criteria_tokens_map_exactly() {
        assert_eq!(criteria_for_token("非制限公開"), Some(Criteria::Unrestricted));
        assert_eq!(
            criteria_for_token("制限公開（Type II）"),
            Some(Criteria::ControlledAccessTypeII)
        );
        assert_eq!(
            criteria_for_token("Controlled-access (Type I)"),
            Some(Criteria::ControlledAccessTypeI)
        );
        assert_eq!(criteria_for_token("限定公開"), None);
    }

    #[test]
    fn type_ii_never_collapses_to_type_i() {
        assert_eq!(
            criteria_for_token("制限公開(Type II)"),
            Some(Criteria::ControlledAccessTypeII)
        );
    }

    #[test]
    fn empty_markers() {
        assert!(is_empty_marker("ー"));
        assert!(is_empty_marker(" N/A "));
        assert!(is_empty_marker(""));
        assert!(!is_empty_marker("JGAD000001"));
    }

    #[test]
    fn cau_hotfix_hit_and_miss() {
        assert!(cau_hotfix_for("hum0031", 5, "松田 文彦").is_some());
        assert!(cau_hotfix_for("hum0031", 4, "松田 文彦").is_none());
        assert!(cau_hotfix_for("hum9999", 5, "松田 文彦").is_none());
    }

    #[test]
    fn provider_historical_spellings() {
        assert_eq!(
            provider_field_for_label("所 属："),
            Some(ProviderField::Affiliation)
        );
        assert_eq!(
            provider_field_for_label("Project / Group Name:"),
            Some(ProviderField::ProjectName)
        );
    }

    #[test]
    fn cau_headers_map() {
        assert_eq!(
            cau_field_for_header("利用データID"),
            Some(CauField::DatasetIds)
        );
        assert_eq!(
            cau_field_for_header("Period of data use"),
            Some(CauField::PeriodOfDataUse)
        );
        assert_eq!(cau_field_for_header("備考"), None);
    }
}
