//! Structure transformation: lifts a normalized page into
//! single-language domain entities. Molecular-data tables become
//! experiments with dataset metadata inherited from the summary table,
//! datasets get content-based version numbers, and an expansion map is
//! built so publication/controlled-access references to studies or
//! parent accessions resolve to the full member-dataset set.

pub mod version;

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract_ids;
use crate::lookup;
use crate::model::*;
use crate::resolver::{AccessionResolver, CachedResolver};
use crate::transform::version::{assign_dataset_version, DatasetVersion};

/// Accession mentioned in free text → the dataset IDs it stands for.
/// Applying the map twice equals applying it once: values are
/// canonical ids that never appear as keys.
#[derive(Debug, Default, Clone)]
pub struct ExpansionMap {
    map: HashMap<String, Vec<String>>,
}

impl ExpansionMap {
    pub fn insert(&mut self, key: String, ids: Vec<String>) {
        self.map.insert(key, ids);
    }

    pub fn expand(&self, ids: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            match self.map.get(id) {
                Some(members) => {
                    for m in members {
                        if !out.contains(m) {
                            out.push(m.clone());
                        }
                    }
                }
                None => {
                    if !out.contains(id) {
                        out.push(id.clone());
                    }
                }
            }
        }
        out
    }
}

/// Prior version histories for one language, keyed by dataset id,
/// oldest first.
pub type ExistingVersions = HashMap<String, Vec<DatasetVersion>>;

/// Version numbering is monotonic per (datasetId, language), so each
/// side carries its own history and a candidate is never compared
/// against the other language's experiment lists.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PriorVersions {
    #[serde(default)]
    pub ja: ExistingVersions,
    #[serde(default)]
    pub en: ExistingVersions,
}

impl PriorVersions {
    pub fn for_lang(&self, lang: Lang) -> &ExistingVersions {
        match lang {
            Lang::Ja => &self.ja,
            Lang::En => &self.en,
        }
    }
}

#[derive(Debug)]
pub struct TransformOutput {
    pub research: SingleLangResearch,
    pub datasets: Vec<SingleLangDataset>,
    pub versions: Vec<ResearchVersion>,
    pub expansion: ExpansionMap,
}

pub async fn transform<R: AccessionResolver>(
    norm: &NormalizedParseResult,
    prior: &PriorVersions,
    resolver: &CachedResolver<R>,
) -> Result<TransformOutput> {
    let summary_meta = index_summary_meta(&norm.summary);

    let mut expansion = ExpansionMap::default();
    let experiments =
        build_experiments(norm, &summary_meta, &mut expansion, resolver).await?;

    add_parent_expansions(&experiments, &summary_meta, &mut expansion);

    let datasets = build_datasets(norm.lang, &experiments, prior.for_lang(norm.lang));
    let versions = build_research_versions(norm);

    let research = SingleLangResearch {
        hum_id: norm.hum_id.clone(),
        lang: norm.lang,
        summary: norm.summary.clone(),
        data_provider: norm.data_provider.clone(),
        publications: norm
            .publications
            .iter()
            .map(|p| NormalizedPublication {
                title: p.title.clone(),
                doi: p.doi.clone(),
                dataset_ids: expansion.expand(&p.dataset_ids),
            })
            .collect(),
        controlled_access_users: norm
            .controlled_access_users
            .iter()
            .map(|u| NormalizedControlledAccessUser {
                dataset_ids: expansion.expand(&u.dataset_ids),
                ..u.clone()
            })
            .collect(),
        releases: norm.releases.clone(),
    };

    Ok(TransformOutput {
        research,
        datasets,
        versions,
        expansion,
    })
}

fn index_summary_meta(
    summary: &NormalizedSummary,
) -> HashMap<String, &NormalizedSummaryDataset> {
    let mut map = HashMap::new();
    for row in &summary.datasets {
        for id in &row.dataset_ids {
            map.entry(id.clone()).or_insert(row);
        }
    }
    map
}

/// One experiment per molecular-data table: dataset ids come from the
/// identifier line (JGAS studies resolved to member datasets, batched
/// per unique study id by the cache), metadata inherited from the
/// summary table.
async fn build_experiments<R: AccessionResolver>(
    norm: &NormalizedParseResult,
    summary_meta: &HashMap<String, &NormalizedSummaryDataset>,
    expansion: &mut ExpansionMap,
    resolver: &CachedResolver<R>,
) -> Result<Vec<SingleLangExperiment>> {
    let mut out = Vec::with_capacity(norm.molecular_data.len());

    for table in &norm.molecular_data {
        let mentioned = extract_ids::extract_ids_by_type(&table.id.text);
        let mut dataset_ids: Vec<String> = Vec::new();
        for &id_type in ALL_ID_TYPES {
            let Some(ids) = mentioned.get(&id_type) else { continue };
            for id in ids {
                if id_type == DatasetIdType::Jgas {
                    let members = resolver.resolve(id).await?;
                    if members.is_empty() {
                        push_unique(&mut dataset_ids, id.clone());
                    } else {
                        expansion.insert(id.clone(), members.to_vec());
                        for m in members.iter() {
                            push_unique(&mut dataset_ids, m.clone());
                        }
                    }
                } else {
                    push_unique(&mut dataset_ids, id.clone());
                }
            }
        }
        if dataset_ids.is_empty() {
            debug!(
                hum_id = %norm.hum_id,
                header = %table.id.text,
                "molecular-data table mentions no accession"
            );
        }

        let meta = dataset_ids
            .iter()
            .find_map(|id| inherit_meta(id, summary_meta));
        out.push(SingleLangExperiment {
            header: table.id.clone(),
            data: table.data.clone(),
            footers: table.footers.clone(),
            dataset_ids,
            type_of_data: meta.map(|m| m.type_of_data.clone()),
            criteria: meta.map(|m| m.criteria.clone()).unwrap_or_default(),
            release_dates: meta.map(|m| m.release_dates.clone()).unwrap_or_default(),
        });
    }

    Ok(out)
}

/// Metadata for one dataset id: direct summary hit, then the explicit
/// override table, then the longest dot-separated prefix among summary
/// ids (children discovered only in molecular-data tables inherit from
/// their parent entry).
fn inherit_meta<'a>(
    dataset_id: &str,
    summary_meta: &HashMap<String, &'a NormalizedSummaryDataset>,
) -> Option<&'a NormalizedSummaryDataset> {
    if let Some(meta) = summary_meta.get(dataset_id) {
        return Some(meta);
    }
    if let Some((_, parent)) = lookup::INHERITANCE_OVERRIDES
        .iter()
        .find(|(child, _)| *child == dataset_id)
    {
        if let Some(meta) = summary_meta.get(*parent) {
            return Some(meta);
        }
    }
    summary_meta
        .iter()
        .filter(|(id, _)| is_dot_prefix(id, dataset_id))
        .max_by_key(|(id, _)| id.len())
        .map(|(_, meta)| *meta)
}

fn is_dot_prefix(prefix: &str, id: &str) -> bool {
    id.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn push_unique(v: &mut Vec<String>, id: String) {
    if !v.contains(&id) {
        v.push(id);
    }
}

/// Parent accessions referenced from free text expand to the children
/// found in molecular-data tables (plus the parent itself when it has
/// experiments of its own).
fn add_parent_expansions(
    experiments: &[SingleLangExperiment],
    summary_meta: &HashMap<String, &NormalizedSummaryDataset>,
    expansion: &mut ExpansionMap,
) {
    let mut by_parent: HashMap<String, Vec<String>> = HashMap::new();
    for exp in experiments {
        for id in &exp.dataset_ids {
            for parent in summary_meta.keys() {
                if is_dot_prefix(parent, id) {
                    let entry = by_parent.entry(parent.clone()).or_default();
                    if !entry.contains(id) {
                        entry.push(id.clone());
                    }
                }
            }
        }
    }
    for (parent, mut children) in by_parent {
        let parent_has_own = experiments
            .iter()
            .any(|e| e.dataset_ids.contains(&parent));
        if parent_has_own {
            children.insert(0, parent.clone());
        }
        expansion.insert(parent, children);
    }
}

fn build_datasets(
    lang: Lang,
    experiments: &[SingleLangExperiment],
    existing: &ExistingVersions,
) -> Vec<SingleLangDataset> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<SingleLangExperiment>> = HashMap::new();
    for exp in experiments {
        for id in &exp.dataset_ids {
            if !grouped.contains_key(id) {
                order.push(id.clone());
            }
            grouped.entry(id.clone()).or_default().push(exp.clone());
        }
    }

    order
        .into_iter()
        .map(|dataset_id| {
            let experiments = grouped.remove(&dataset_id).unwrap_or_default();
            let prior = existing.get(&dataset_id).map(Vec::as_slice).unwrap_or(&[]);
            let version = assign_dataset_version(&experiments, prior);
            SingleLangDataset {
                dataset_id,
                lang,
                version,
                experiments,
            }
        })
        .collect()
}

fn build_research_versions(norm: &NormalizedParseResult) -> Vec<ResearchVersion> {
    norm.releases
        .rows
        .iter()
        .map(|row| {
            let note = norm
                .releases
                .notes
                .iter()
                .find(|n| n.hum_version_id == row.hum_version_id);
            let full_text = match note {
                Some(n) => format!("{}\n{}", row.content, n.text),
                None => row.content.clone(),
            };
            let mut dataset_ids: Vec<String> = Vec::new();
            for ids in extract_ids::extract_ids_by_type(&full_text).into_values() {
                for id in ids {
                    push_unique(&mut dataset_ids, id);
                }
            }
            dataset_ids.sort();
            let content = match norm.lang {
                Lang::Ja => BilingualText {
                    ja: Some(full_text),
                    en: None,
                },
                Lang::En => BilingualText {
                    ja: None,
                    en: Some(full_text),
                },
            };
            ResearchVersion {
                hum_id: norm.hum_id.clone(),
                hum_version_id: row.hum_version_id.clone(),
                release_date: row.release_date.clone(),
                content,
                dataset_ids,
            }
        })
        .collect()
}
