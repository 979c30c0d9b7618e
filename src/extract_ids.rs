//! Accession-ID recognition: one fixed pattern per ID family, applied
//! to arbitrary free text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DatasetIdType, ALL_ID_TYPES};

static DRA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[DES]R[APRSXZ]\d{6,}").unwrap());
static JGAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"JGAD\d{6}").unwrap());
static JGAS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"JGAS\d{6}").unwrap());
static GEA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"E-GEAD-\d+").unwrap());
static NBDC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hum\d+\.v\d+\.[\w-]+\.v\d+").unwrap());
static BP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PRJDB\d+").unwrap());
static METABO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"MTBKS\d+").unwrap());

pub fn pattern_for(id_type: DatasetIdType) -> &'static Regex {
    match id_type {
        DatasetIdType::Dra => &DRA_RE,
        DatasetIdType::Jgad => &JGAD_RE,
        DatasetIdType::Jgas => &JGAS_RE,
        DatasetIdType::Gea => &GEA_RE,
        DatasetIdType::NbdcDataset => &NBDC_RE,
        DatasetIdType::Bp => &BP_RE,
        DatasetIdType::Metabo => &METABO_RE,
    }
}

/// All accession matches in `text`, grouped by family. Families with
/// no match are omitted from the map.
pub fn extract_ids_by_type(text: &str) -> HashMap<DatasetIdType, Vec<String>> {
    let mut out: HashMap<DatasetIdType, Vec<String>> = HashMap::new();
    for &id_type in ALL_ID_TYPES {
        let matches: Vec<String> = pattern_for(id_type)
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        if !matches.is_empty() {
            out.insert(id_type, matches);
        }
    }
    out
}

/// Family of the first pattern that matches anywhere in `s`, if any.
pub fn classify_id(s: &str) -> Option<DatasetIdType> {
    ALL_ID_TYPES
        .iter()
        .copied()
        .find(|&t| pattern_for(t).is_match(s))
}

/// True iff any family pattern matches anywhere in `s`. This is a
/// substring test, not a full-string anchor: "xJGAD000001y" validates
/// as true, and callers rely on that permissiveness.
pub fn is_valid_dataset_id(s: &str) -> bool {
    ALL_ID_TYPES.iter().any(|&t| pattern_for(t).is_match(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_family() {
        let ids = extract_ids_by_type("See JGAD000001 and JGAS000002");
        assert_eq!(ids[&DatasetIdType::Jgad], vec!["JGAD000001"]);
        assert_eq!(ids[&DatasetIdType::Jgas], vec!["JGAS000002"]);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn no_accessions_empty_map() {
        assert!(extract_ids_by_type("no accessions here").is_empty());
    }

    #[test]
    fn dra_family_covers_mirror_prefixes() {
        let ids = extract_ids_by_type("DRA001273 SRP012345 ERX123456");
        let dra = &ids[&DatasetIdType::Dra];
        assert_eq!(dra.len(), 3);
    }

    #[test]
    fn nbdc_dataset_ids() {
        let ids = extract_ids_by_type("hum0009.v1.freq.v1");
        assert_eq!(ids[&DatasetIdType::NbdcDataset], vec!["hum0009.v1.freq.v1"]);
    }

    #[test]
    fn substring_semantics_kept() {
        assert!(is_valid_dataset_id("xJGAD000001y"));
        assert!(is_valid_dataset_id("E-GEAD-123"));
        assert!(!is_valid_dataset_id("JGAD00001")); // five digits, not six
    }

    #[test]
    fn classify_prefers_declared_order() {
        assert_eq!(classify_id("JGAS000001"), Some(DatasetIdType::Jgas));
        assert_eq!(classify_id("PRJDB1234"), Some(DatasetIdType::Bp));
        assert_eq!(classify_id("MTBKS100"), Some(DatasetIdType::Metabo));
    }
}
