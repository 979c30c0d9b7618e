mod extract_ids;
mod html;
mod llm;
mod lookup;
mod merge;
mod model;
mod normalize;
mod parser;
mod resolver;
mod textutil;
mod transform;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use llm::{FieldExtractor, LlmConfig};
use model::{Lang, NormalizedParseResult, RawParseResult, SearchableExperimentFields, UnifiedResearch};
use resolver::{CachedResolver, StaticResolver};
use transform::{PriorVersions, TransformOutput};

#[derive(Parser)]
#[command(name = "humdbs_parser", about = "NBDC Human Database page extraction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and normalize page dumps into per-page JSON
    Parse {
        /// Directory of {humId}.{lang}.html dumps
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for {humId}.{lang}.json
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file mapping JGAS study ids to dataset ids
        #[arg(long)]
        study_map: Option<PathBuf>,
        /// Max pages to parse (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Merge normalized ja/en page pairs into unified research JSON
    Merge {
        /// Directory of {humId}.{lang}.json normalized pages
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for {humId}.json
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file mapping JGAS study ids to dataset ids
        #[arg(long)]
        study_map: Option<PathBuf>,
        /// JSON file of per-language prior dataset version histories
        #[arg(long)]
        prior: Option<PathBuf>,
    },
    /// Attach LLM-extracted searchable fields to unified research JSON
    Enrich {
        /// Directory of {humId}.json unified records
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory (may equal input)
        #[arg(short, long)]
        output: PathBuf,
        /// LLM endpoint base URL
        #[arg(long, default_value = "http://localhost:11434")]
        llm_url: String,
        /// Model name
        #[arg(long, default_value = "llama3.1")]
        model: String,
        /// Concurrent LLM requests
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Parse + merge (+ optionally enrich) in one pipeline
    Run {
        /// Directory of {humId}.{lang}.html dumps
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for {humId}.json
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file mapping JGAS study ids to dataset ids
        #[arg(long)]
        study_map: Option<PathBuf>,
        /// JSON file of per-language prior dataset version histories
        #[arg(long)]
        prior: Option<PathBuf>,
        /// Also run searchable-field extraction
        #[arg(long)]
        enrich: bool,
        /// LLM endpoint base URL
        #[arg(long, default_value = "http://localhost:11434")]
        llm_url: String,
        /// Model name
        #[arg(long, default_value = "llama3.1")]
        model: String,
        /// Concurrent LLM requests
        #[arg(long, default_value = "4")]
        concurrency: usize,
        /// Max pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            output,
            study_map,
            limit,
        } => {
            let resolver = CachedResolver::new(load_study_map(study_map.as_deref())?);
            let pages = discover_pages(&input, limit)?;
            if pages.is_empty() {
                println!("No page dumps found in {}.", input.display());
                return Ok(());
            }
            fs::create_dir_all(&output)?;
            println!("Parsing {} research entries...", pages.len());
            let counts = parse_pages(&pages, &output, &resolver).await?;
            counts.print();
            Ok(())
        }
        Commands::Merge {
            input,
            output,
            study_map,
            prior,
        } => {
            let resolver = CachedResolver::new(load_study_map(study_map.as_deref())?);
            let histories = load_prior_versions(prior.as_deref())?;
            let pairs = discover_normalized(&input)?;
            if pairs.is_empty() {
                println!("No normalized pages found. Run 'parse' first.");
                return Ok(());
            }
            fs::create_dir_all(&output)?;
            println!("Merging {} research entries...", pairs.len());
            let mut counts = RunCounts::default();
            for (hum_id, ja, en) in pairs {
                let unified = merge_pair(&ja, en.as_ref(), &histories, &resolver).await?;
                counts.tally(&unified);
                write_json(&output.join(format!("{hum_id}.json")), &unified)?;
            }
            counts.print();
            Ok(())
        }
        Commands::Enrich {
            input,
            output,
            llm_url,
            model,
            concurrency,
        } => {
            let extractor = Arc::new(FieldExtractor::new(LlmConfig {
                base_url: llm_url,
                model,
                ..LlmConfig::default()
            })?);
            let records = discover_unified(&input)?;
            if records.is_empty() {
                println!("No unified records found. Run 'merge' first.");
                return Ok(());
            }
            fs::create_dir_all(&output)?;
            println!("Enriching {} research entries...", records.len());
            let mut counts = RunCounts::default();
            for (hum_id, mut unified) in records {
                counts.enrich_empty +=
                    enrich_research(&mut unified, Arc::clone(&extractor), concurrency).await?;
                counts.tally(&unified);
                write_json(&output.join(format!("{hum_id}.json")), &unified)?;
            }
            counts.print();
            Ok(())
        }
        Commands::Run {
            input,
            output,
            study_map,
            prior,
            enrich,
            llm_url,
            model,
            concurrency,
            limit,
        } => {
            let resolver = CachedResolver::new(load_study_map(study_map.as_deref())?);
            let histories = load_prior_versions(prior.as_deref())?;
            let pages = discover_pages(&input, limit)?;
            if pages.is_empty() {
                println!("No page dumps found in {}.", input.display());
                return Ok(());
            }
            fs::create_dir_all(&output)?;
            let extractor = if enrich {
                Some(Arc::new(FieldExtractor::new(LlmConfig {
                    base_url: llm_url,
                    model,
                    ..LlmConfig::default()
                })?))
            } else {
                None
            };

            println!("Pipeline: processing {} research entries...", pages.len());
            let counts = run_pipeline(
                &pages,
                &output,
                &resolver,
                &histories,
                extractor,
                concurrency,
            )
            .await?;
            counts.print();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

// ── Input discovery ──

/// One research entry's dump files. The English page and both release
/// pages are optional.
struct PageFiles {
    hum_id: String,
    ja: PathBuf,
    en: Option<PathBuf>,
    ja_release: Option<PathBuf>,
    en_release: Option<PathBuf>,
}

fn discover_pages(dir: &Path, limit: Option<usize>) -> Result<Vec<PageFiles>> {
    let mut hum_ids: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(hum_id) = name.strip_suffix(".ja.html") {
            hum_ids.push(hum_id.to_string());
        }
    }
    hum_ids.sort();
    if let Some(limit) = limit {
        hum_ids.truncate(limit);
    }

    Ok(hum_ids
        .into_iter()
        .map(|hum_id| {
            let optional = |suffix: &str| {
                let p = dir.join(format!("{hum_id}.{suffix}"));
                p.exists().then_some(p)
            };
            PageFiles {
                ja: dir.join(format!("{hum_id}.ja.html")),
                en: optional("en.html"),
                ja_release: optional("ja.release.html"),
                en_release: optional("en.release.html"),
                hum_id,
            }
        })
        .collect())
}

fn discover_normalized(
    dir: &Path,
) -> Result<Vec<(String, NormalizedParseResult, Option<NormalizedParseResult>)>> {
    let mut out = Vec::new();
    let mut hum_ids: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| {
            let name = e.ok()?.file_name().to_string_lossy().into_owned();
            Some(name.strip_suffix(".ja.json")?.to_string())
        })
        .collect();
    hum_ids.sort();

    for hum_id in hum_ids {
        let ja: NormalizedParseResult = read_json(&dir.join(format!("{hum_id}.ja.json")))?;
        let en_path = dir.join(format!("{hum_id}.en.json"));
        let en = en_path.exists().then(|| read_json(&en_path)).transpose()?;
        out.push((hum_id, ja, en));
    }
    Ok(out)
}

fn discover_unified(dir: &Path) -> Result<Vec<(String, UnifiedResearch)>> {
    let mut out = Vec::new();
    let mut names: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| {
            let name = e.ok()?.file_name().to_string_lossy().into_owned();
            let stem = name.strip_suffix(".json")?;
            (!stem.contains('.')).then(|| stem.to_string())
        })
        .collect();
    names.sort();

    for hum_id in names {
        let unified = read_json(&dir.join(format!("{hum_id}.json")))?;
        out.push((hum_id, unified));
    }
    Ok(out)
}

fn load_study_map(path: Option<&Path>) -> Result<StaticResolver> {
    match path {
        Some(path) => {
            let map: HashMap<String, Vec<String>> = read_json(path)?;
            Ok(StaticResolver::new(map))
        }
        None => Ok(StaticResolver::empty()),
    }
}

fn load_prior_versions(path: Option<&Path>) -> Result<PriorVersions> {
    match path {
        Some(path) => read_json(path),
        None => Ok(PriorVersions::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("decoding {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

// ── Pipeline stages ──

/// Parse one language's dump pair into a raw page. Missing body is the
/// one per-page fatal condition and surfaces as Err.
fn parse_one(
    page: &PageFiles,
    lang: Lang,
    markup_path: &Path,
    release_path: Option<&Path>,
) -> Result<RawParseResult> {
    let markup = fs::read_to_string(markup_path)
        .with_context(|| format!("reading {}", markup_path.display()))?;
    let mut raw = parser::parse_page(&markup, &page.hum_id, lang)?;
    if let Some(release_path) = release_path {
        let markup = fs::read_to_string(release_path)
            .with_context(|| format!("reading {}", release_path.display()))?;
        raw.releases = parser::parse_release_page(&markup, &page.hum_id, lang)?;
    }
    Ok(raw)
}

/// Raw parse results for one research entry, ja then optional en.
/// Parsing is CPU-bound and runs inside the rayon worker.
fn parse_entry(page: &PageFiles) -> Result<(RawParseResult, Option<RawParseResult>)> {
    let ja = parse_one(page, Lang::Ja, &page.ja, page.ja_release.as_deref())?;
    let en = match &page.en {
        Some(path) => Some(parse_one(page, Lang::En, path, page.en_release.as_deref())?),
        None => None,
    };
    Ok((ja, en))
}

async fn parse_pages(
    pages: &[PageFiles],
    output: &Path,
    resolver: &CachedResolver<StaticResolver>,
) -> Result<RunCounts> {
    use rayon::prelude::*;

    let pb = progress_bar(pages.len());
    let mut counts = RunCounts::default();

    for chunk in pages.chunks(100) {
        let parsed: Vec<_> = chunk
            .par_iter()
            .map(|page| (page.hum_id.clone(), parse_entry(page)))
            .collect();

        for (hum_id, result) in parsed {
            let (ja, en) = match result {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(hum_id, error = %err, "page failed");
                    counts.errors += 1;
                    continue;
                }
            };
            let norm = normalize::normalize_parse_result(&ja, resolver).await?;
            write_json(&output.join(format!("{hum_id}.ja.json")), &norm)?;
            if let Some(en) = en {
                let norm = normalize::normalize_parse_result(&en, resolver).await?;
                write_json(&output.join(format!("{hum_id}.en.json")), &norm)?;
            }
            counts.pages += 1;
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

async fn merge_pair(
    ja: &NormalizedParseResult,
    en: Option<&NormalizedParseResult>,
    prior: &PriorVersions,
    resolver: &CachedResolver<StaticResolver>,
) -> Result<UnifiedResearch> {
    let ja_out: TransformOutput = transform::transform(ja, prior, resolver).await?;
    let en_out = match en {
        Some(en) => Some(transform::transform(en, prior, resolver).await?),
        None => None,
    };
    Ok(merge::merge_research(&ja_out, en_out.as_ref()))
}

async fn run_pipeline(
    pages: &[PageFiles],
    output: &Path,
    resolver: &CachedResolver<StaticResolver>,
    prior: &PriorVersions,
    extractor: Option<Arc<FieldExtractor>>,
    concurrency: usize,
) -> Result<RunCounts> {
    use rayon::prelude::*;

    let pb = progress_bar(pages.len());
    let mut counts = RunCounts::default();

    for chunk in pages.chunks(100) {
        let parsed: Vec<_> = chunk
            .par_iter()
            .map(|page| (page.hum_id.clone(), parse_entry(page)))
            .collect();

        for (hum_id, result) in parsed {
            let (raw_ja, raw_en) = match result {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(hum_id, error = %err, "page failed");
                    counts.errors += 1;
                    pb.inc(1);
                    continue;
                }
            };
            let ja = normalize::normalize_parse_result(&raw_ja, resolver).await?;
            let en = match &raw_en {
                Some(raw) => Some(normalize::normalize_parse_result(raw, resolver).await?),
                None => None,
            };
            let mut unified = merge_pair(&ja, en.as_ref(), prior, resolver).await?;
            if let Some(extractor) = &extractor {
                counts.enrich_empty +=
                    enrich_research(&mut unified, Arc::clone(extractor), concurrency).await?;
            }
            counts.tally(&unified);
            counts.pages += 1;
            write_json(&output.join(format!("{hum_id}.json")), &unified)?;
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    Ok(counts)
}

/// Searchable-field extraction over every experiment of one research
/// entry, bounded by a semaphore. Returns how many extractions came
/// back all-default.
async fn enrich_research(
    unified: &mut UnifiedResearch,
    extractor: Arc<FieldExtractor>,
    concurrency: usize,
) -> Result<usize> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel(32);

    let mut pending = 0usize;
    for (d, dataset) in unified.datasets.iter().enumerate() {
        for (e, exp) in dataset.experiments.iter().enumerate() {
            let external = serde_json::json!({
                "humId": unified.hum_id,
                "datasetIds": exp.dataset_ids,
                "typeOfData": exp.type_of_data,
            });
            let ja = exp.ja.clone();
            let en = exp.en.clone();
            let extractor = Arc::clone(&extractor);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            pending += 1;
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let fields = extractor.extract(ja.as_ref(), en.as_ref(), &external).await;
                let _ = tx.send((d, e, fields)).await;
            });
        }
    }
    drop(tx);

    let mut empty = 0usize;
    while let Some((d, e, fields)) = rx.recv().await {
        if fields == SearchableExperimentFields::default() {
            debug!(hum_id = %unified.hum_id, dataset = %unified.datasets[d].dataset_id, "extraction came back empty");
            empty += 1;
        }
        unified.datasets[d].experiments[e].searchable = Some(fields);
        pending -= 1;
    }
    debug_assert_eq!(pending, 0);
    Ok(empty)
}

// ── Stats ──

#[derive(Default)]
struct RunCounts {
    pages: usize,
    errors: usize,
    datasets: usize,
    experiments: usize,
    unmatched: usize,
    enrich_empty: usize,
}

impl RunCounts {
    fn tally(&mut self, unified: &UnifiedResearch) {
        self.datasets += unified.datasets.len();
        for d in &unified.datasets {
            self.experiments += d.experiments.len();
            self.unmatched += d
                .experiments
                .iter()
                .filter(|e| {
                    matches!(
                        e.match_type,
                        model::MatchType::UnmatchedJa | model::MatchType::UnmatchedEn
                    )
                })
                .count();
        }
    }

    fn print(&self) {
        println!(
            "Saved {} entries ({} errors): {} datasets, {} experiments ({} unmatched), {} empty extractions.",
            self.pages, self.errors, self.datasets, self.experiments, self.unmatched, self.enrich_empty,
        );
    }
}

fn progress_bar(len: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
