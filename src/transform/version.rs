//! Content-based dataset versioning. A version number is reused when
//! the candidate experiment list is deep-equal to a prior version's
//! list; otherwise the next `v{n+1}` is allocated. Prior versions must
//! be supplied oldest first.

use serde::{Deserialize, Serialize};

use crate::model::SingleLangExperiment;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub version: String,
    pub experiments: Vec<SingleLangExperiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BilingualDatasetVersion {
    pub version: String,
    pub ja: Vec<SingleLangExperiment>,
    pub en: Vec<SingleLangExperiment>,
}

/// Version for one (datasetId, lang) candidate list against that
/// dataset's prior versions.
pub fn assign_dataset_version(
    experiments: &[SingleLangExperiment],
    existing: &[DatasetVersion],
) -> String {
    for prior in existing {
        if prior.experiments == experiments {
            return prior.version.clone();
        }
    }
    format!("v{}", existing.len() + 1)
}

/// Bilingual-synchronized variant: reuse requires deep equality on
/// both language sides.
pub fn assign_dataset_version_bilingual(
    ja: &[SingleLangExperiment],
    en: &[SingleLangExperiment],
    existing: &[BilingualDatasetVersion],
) -> String {
    for prior in existing {
        if prior.ja == ja && prior.en == en {
            return prior.version.clone();
        }
    }
    format!("v{}", existing.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextValue;

    fn exp(header: &str) -> SingleLangExperiment {
        SingleLangExperiment {
            header: TextValue::from_text(header),
            ..Default::default()
        }
    }

    #[test]
    fn first_version_is_v1() {
        assert_eq!(assign_dataset_version(&[exp("a")], &[]), "v1");
    }

    #[test]
    fn deep_equal_list_reuses_version() {
        let existing = vec![DatasetVersion {
            version: "v1".into(),
            experiments: vec![exp("a")],
        }];
        assert_eq!(assign_dataset_version(&[exp("a")], &existing), "v1");
    }

    #[test]
    fn changed_list_allocates_next() {
        let existing = vec![DatasetVersion {
            version: "v1".into(),
            experiments: vec![exp("a")],
        }];
        assert_eq!(assign_dataset_version(&[exp("b")], &existing), "v2");
    }

    #[test]
    fn versions_stay_contiguous() {
        let mut existing: Vec<DatasetVersion> = Vec::new();
        for (i, h) in ["a", "b", "c"].iter().enumerate() {
            let v = assign_dataset_version(&[exp(h)], &existing);
            assert_eq!(v, format!("v{}", i + 1));
            existing.push(DatasetVersion {
                version: v,
                experiments: vec![exp(h)],
            });
        }
        // Resubmitting an old list reuses its version, no gap appears.
        assert_eq!(assign_dataset_version(&[exp("b")], &existing), "v2");
    }

    #[test]
    fn bilingual_requires_both_sides_equal() {
        let existing = vec![BilingualDatasetVersion {
            version: "v1".into(),
            ja: vec![exp("ja")],
            en: vec![exp("en")],
        }];
        assert_eq!(
            assign_dataset_version_bilingual(&[exp("ja")], &[exp("en")], &existing),
            "v1"
        );
        assert_eq!(
            assign_dataset_version_bilingual(&[exp("ja")], &[exp("en2")], &existing),
            "v2"
        );
    }
}
