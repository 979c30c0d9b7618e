use serde::{Deserialize, Serialize};

/// Page language. Every detail page exists as an independent ja/en pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Ja,
    En,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Ja => "ja",
            Lang::En => "en",
        }
    }
}

/// Plain text plus the sanitized HTML fragment it came from.
/// `raw_html` keeps tag structure only; style/class/id/rel/target
/// attributes are stripped during re-serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextValue {
    pub text: String,
    pub raw_html: String,
}

impl TextValue {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        TextValue {
            raw_html: text.clone(),
            text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualText {
    pub ja: Option<String>,
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualTextValue {
    pub ja: Option<TextValue>,
    pub en: Option<TextValue>,
}

/// Canonical data-access restriction level, independent of source
/// language and wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criteria {
    #[serde(rename = "Controlled-access (Type I)")]
    ControlledAccessTypeI,
    #[serde(rename = "Controlled-access (Type II)")]
    ControlledAccessTypeII,
    #[serde(rename = "Unrestricted-access")]
    Unrestricted,
}

impl Criteria {
    pub fn label(&self) -> &'static str {
        match self {
            Criteria::ControlledAccessTypeI => "Controlled-access (Type I)",
            Criteria::ControlledAccessTypeII => "Controlled-access (Type II)",
            Criteria::Unrestricted => "Unrestricted-access",
        }
    }
}

/// Accession-ID family. One fixed pattern per variant lives in
/// `extract_ids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetIdType {
    #[serde(rename = "DRA")]
    Dra,
    #[serde(rename = "JGAD")]
    Jgad,
    #[serde(rename = "JGAS")]
    Jgas,
    #[serde(rename = "GEA")]
    Gea,
    #[serde(rename = "NBDC_DATASET")]
    NbdcDataset,
    #[serde(rename = "BP")]
    Bp,
    #[serde(rename = "METABO")]
    Metabo,
}

pub const ALL_ID_TYPES: &[DatasetIdType] = &[
    DatasetIdType::Dra,
    DatasetIdType::Jgad,
    DatasetIdType::Jgas,
    DatasetIdType::Gea,
    DatasetIdType::NbdcDataset,
    DatasetIdType::Bp,
    DatasetIdType::Metabo,
];

/// How a bilingual pair was formed. Recorded on every merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "fuzzy")]
    Fuzzy,
    #[serde(rename = "position")]
    Position,
    #[serde(rename = "unmatched-ja")]
    UnmatchedJa,
    #[serde(rename = "unmatched-en")]
    UnmatchedEn,
}

/// `{text, href}` pair collected from an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlLink {
    pub text: String,
    pub href: String,
}

// ── Raw records (section-parser output, strings uninterpreted) ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSummary {
    pub aims: Vec<TextValue>,
    pub methods: Vec<TextValue>,
    pub targets: Vec<TextValue>,
    pub urls: Vec<UrlLink>,
    pub datasets: Vec<RawSummaryDataset>,
    pub footers: Vec<TextValue>,
}

/// One row of the summary data table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSummaryDataset {
    pub dataset_id: String,
    pub type_of_data: String,
    pub criteria: String,
    pub release_date: String,
}

/// One molecular-data table: the identifier line above it, the
/// key/value rows (repeated keys newline-joined), and the free text
/// between this table and the next identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MolDataTable {
    pub id: TextValue,
    pub data: Vec<(String, TextValue)>,
    pub footers: Vec<TextValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrant {
    pub grant_name: String,
    pub title: String,
    pub grant_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataProvider {
    pub principal_investigator: Option<TextValue>,
    pub affiliation: Option<TextValue>,
    pub project_name: Option<TextValue>,
    pub project_url: Option<String>,
    pub grants: Vec<RawGrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPublication {
    pub title: String,
    pub doi: String,
    pub dataset_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawControlledAccessUser {
    pub principal_investigator: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub research_title: Option<String>,
    pub dataset_ids: Vec<String>,
    pub period_of_data_use: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReleaseRow {
    pub hum_version_id: String,
    pub release_date: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNote {
    pub hum_version_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRelease {
    pub rows: Vec<RawReleaseRow>,
    pub notes: Vec<ReleaseNote>,
}

/// Everything one section-parsing pass over one (page, language) pair
/// produced. Immutable input to normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParseResult {
    pub hum_id: String,
    pub lang: Lang,
    pub summary: RawSummary,
    pub molecular_data: Vec<MolDataTable>,
    pub data_provider: RawDataProvider,
    pub publications: Vec<RawPublication>,
    pub controlled_access_users: Vec<RawControlledAccessUser>,
    pub releases: RawRelease,
}

// ── Normalized records (strings interpreted) ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSummaryDataset {
    pub dataset_ids: Vec<String>,
    pub type_of_data: String,
    pub criteria: Vec<Criteria>,
    pub release_dates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSummary {
    pub aims: Vec<TextValue>,
    pub methods: Vec<TextValue>,
    pub targets: Vec<TextValue>,
    pub urls: Vec<UrlLink>,
    pub datasets: Vec<NormalizedSummaryDataset>,
    pub footers: Vec<TextValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDataProvider {
    pub principal_investigator: Option<TextValue>,
    pub affiliation: Option<TextValue>,
    pub project_name: Option<TextValue>,
    pub project_url: Option<String>,
    pub grants: Vec<RawGrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPublication {
    pub title: String,
    pub doi: String,
    pub dataset_ids: Vec<String>,
}

/// `{startDate, endDate}` parsed from a period-of-data-use cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedControlledAccessUser {
    pub principal_investigator: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub research_title: Option<String>,
    pub dataset_ids: Vec<String>,
    pub period_of_data_use: Option<Period>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRelease {
    pub rows: Vec<NormalizedReleaseRow>,
    pub notes: Vec<ReleaseNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReleaseRow {
    pub hum_version_id: String,
    pub release_date: Option<String>,
    pub content: String,
}

/// Structurally the same page as `RawParseResult`, with every
/// string-typed leaf interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedParseResult {
    pub hum_id: String,
    pub lang: Lang,
    pub summary: NormalizedSummary,
    pub molecular_data: Vec<MolDataTable>,
    pub data_provider: NormalizedDataProvider,
    pub publications: Vec<NormalizedPublication>,
    pub controlled_access_users: Vec<NormalizedControlledAccessUser>,
    pub releases: NormalizedRelease,
}

// ── Single-language entities (transformer output) ──

/// One molecular-data table lifted into an experiment, with dataset
/// metadata inherited from the summary table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleLangExperiment {
    pub header: TextValue,
    pub data: Vec<(String, TextValue)>,
    pub footers: Vec<TextValue>,
    pub dataset_ids: Vec<String>,
    pub type_of_data: Option<String>,
    pub criteria: Vec<Criteria>,
    pub release_dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleLangDataset {
    pub dataset_id: String,
    pub lang: Lang,
    pub version: String,
    pub experiments: Vec<SingleLangExperiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleLangResearch {
    pub hum_id: String,
    pub lang: Lang,
    pub summary: NormalizedSummary,
    pub data_provider: NormalizedDataProvider,
    pub publications: Vec<NormalizedPublication>,
    pub controlled_access_users: Vec<NormalizedControlledAccessUser>,
    pub releases: NormalizedRelease,
}

/// One portal release of a research entry (`hum0001-v2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchVersion {
    pub hum_id: String,
    pub hum_version_id: String,
    pub release_date: Option<String>,
    pub content: BilingualText,
    pub dataset_ids: Vec<String>,
}

// ── Unified (bilingual) entities ──

/// One language's view of an experiment, as shipped to search and to
/// the searchable-field extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSide {
    pub header: TextValue,
    pub data: Vec<(String, TextValue)>,
    pub footers: Vec<TextValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedExperiment {
    pub match_type: MatchType,
    pub dataset_ids: Vec<String>,
    pub ja: Option<ExperimentSide>,
    pub en: Option<ExperimentSide>,
    pub type_of_data: BilingualText,
    pub criteria: Vec<Criteria>,
    pub release_dates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<SearchableExperimentFields>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedDataset {
    pub dataset_id: String,
    pub version: String,
    pub experiments: Vec<UnifiedExperiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPublication {
    pub match_type: MatchType,
    pub title: BilingualText,
    pub doi: Option<String>,
    pub dataset_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedGrant {
    pub match_type: MatchType,
    pub grant_name: BilingualText,
    pub title: BilingualText,
    pub grant_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedControlledAccessUser {
    pub match_type: MatchType,
    pub principal_investigator: BilingualText,
    pub affiliation: BilingualText,
    pub country: Option<String>,
    pub research_title: BilingualText,
    pub dataset_ids: Vec<String>,
    pub period_of_data_use: Option<Period>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResearchProject {
    pub match_type: MatchType,
    pub name: BilingualText,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedSummary {
    pub aims: BilingualTextValue,
    pub methods: BilingualTextValue,
    pub targets: BilingualTextValue,
    pub urls_ja: Vec<UrlLink>,
    pub urls_en: Vec<UrlLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResearch {
    pub hum_id: String,
    pub summary: UnifiedSummary,
    pub principal_investigator: BilingualText,
    pub affiliation: BilingualText,
    pub research_projects: Vec<UnifiedResearchProject>,
    pub grants: Vec<UnifiedGrant>,
    pub datasets: Vec<UnifiedDataset>,
    pub publications: Vec<UnifiedPublication>,
    pub controlled_access_users: Vec<UnifiedControlledAccessUser>,
    pub versions: Vec<ResearchVersion>,
}

// ── Searchable fields (LLM-extracted) ──

/// Structured biomedical attributes extracted from one experiment's
/// bilingual free text. Every field is independently defaultable; a
/// failed extraction yields `SearchableExperimentFields::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchableExperimentFields {
    pub subject_count: Option<i64>,
    pub healthy_subject_count: Option<i64>,
    pub patient_subject_count: Option<i64>,
    pub sample_count: Option<i64>,
    pub diseases: Vec<String>,
    pub disease_categories: Vec<String>,
    pub tissues: Vec<String>,
    pub cell_types: Vec<String>,
    pub is_tumor: Option<bool>,
    pub species: Vec<String>,
    pub sex: Option<String>,
    pub age_range: Option<String>,
    pub data_types: Vec<String>,
    pub platforms: Vec<String>,
    pub library_preparation: Option<String>,
    pub read_length: Option<String>,
    pub total_data_volume: Option<String>,
    pub variant_count: Option<i64>,
    pub marker_count: Option<i64>,
    pub target_regions: Vec<String>,
    pub reference_genome: Option<String>,
    pub analysis_software: Vec<String>,
    pub file_formats: Vec<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_type_serializes_kebab() {
        let j = serde_json::to_string(&MatchType::UnmatchedJa).unwrap();
        assert_eq!(j, "\"unmatched-ja\"");
    }

    #[test]
    fn criteria_labels_round_trip() {
        for c in [
            Criteria::ControlledAccessTypeI,
            Criteria::ControlledAccessTypeII,
            Criteria::Unrestricted,
        ] {
            let j = serde_json::to_string(&c).unwrap();
            let back: Criteria = serde_json::from_str(&j).unwrap();
            assert_eq!(c, back);
            assert_eq!(j, format!("\"{}\"", c.label()));
        }
    }

    #[test]
    fn default_records_are_empty() {
        let t = MolDataTable::default();
        assert!(t.id.text.is_empty());
        assert!(t.id.raw_html.is_empty());
        assert!(ExperimentSide::default().data.is_empty());
    }

    #[test]
    fn searchable_fields_default_is_all_empty() {
        let f = SearchableExperimentFields::default();
        assert!(f.subject_count.is_none());
        assert!(f.diseases.is_empty());
        assert!(f.is_tumor.is_none());
    }

    #[test]
    fn searchable_fields_tolerates_missing_keys() {
        let f: SearchableExperimentFields =
            serde_json::from_str(r#"{"subjectCount": 12}"#).unwrap();
        assert_eq!(f.subject_count, Some(12));
        assert!(f.platforms.is_empty());
    }
}
