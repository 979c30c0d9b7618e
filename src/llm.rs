//! Searchable-field extraction. Sends one experiment's bilingual free
//! text to an Ollama-compatible `/api/chat` endpoint and parses the
//! JSON reply field by field. A field that fails validation falls back
//! to its default; a request that fails all attempts yields the
//! all-default record. Extraction never fails the pipeline.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::model::{ExperimentSide, SearchableExperimentFields};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

const SYSTEM_PROMPT: &str = "You extract structured biomedical metadata from \
experiment descriptions taken from a human genomic-data portal. The input is a \
JSON object with the Japanese rendition (ja), the English rendition (en), and \
externalMetadata; either rendition may be null. Reply with a single JSON object \
using exactly these keys: subjectCount, healthySubjectCount, \
patientSubjectCount, sampleCount, diseases, diseaseCategories, tissues, \
cellTypes, isTumor, species, sex, ageRange, dataTypes, platforms, \
libraryPreparation, readLength, totalDataVolume, variantCount, markerCount, \
targetRegions, referenceGenome, analysisSoftware, fileFormats, notes. Counts \
are integers or null. diseases, diseaseCategories, tissues, cellTypes, \
species, dataTypes, platforms, targetRegions, analysisSoftware and fileFormats \
are arrays of English strings. isTumor is a boolean or null. The remaining \
keys are strings or null. Use null or an empty array when the text does not \
state a value. Never guess.";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub num_ctx: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            num_ctx: 8192,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct FieldExtractor {
    http: reqwest::Client,
    config: LlmConfig,
}

impl FieldExtractor {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building LLM http client")?;
        Ok(FieldExtractor { http, config })
    }

    /// Extract searchable fields for one experiment. Timeouts count as
    /// network errors for retry purposes; after the last attempt the
    /// all-default record is returned.
    pub async fn extract(
        &self,
        ja: Option<&ExperimentSide>,
        en: Option<&ExperimentSide>,
        external_metadata: &Value,
    ) -> SearchableExperimentFields {
        let payload = json!({
            "ja": ja.map(side_payload),
            "en": en.map(side_payload),
            "externalMetadata": external_metadata,
        })
        .to_string();

        for attempt in 0..MAX_RETRIES {
            match self.chat(&payload).await {
                Ok(content) => return parse_searchable_fields(&content),
                Err(err) => {
                    warn!(attempt, error = %err, "searchable-field request failed");
                    if attempt + 1 < MAX_RETRIES {
                        let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }
        SearchableExperimentFields::default()
    }

    async fn chat(&self, user_content: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            format: "json",
            stream: false,
            options: ChatOptions {
                num_ctx: self.config.num_ctx,
            },
        };
        let resp: ChatResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.message.content)
    }
}

fn side_payload(side: &ExperimentSide) -> Value {
    json!({
        "header": side.header.text,
        "data": side
            .data
            .iter()
            .map(|(k, v)| json!({"key": k, "value": v.text}))
            .collect::<Vec<_>>(),
        "footers": side.footers.iter().map(|f| f.text.clone()).collect::<Vec<_>>(),
    })
}

/// Field-by-field validation of the model reply. A malformed field is
/// dropped to its default instead of discarding the whole record.
pub fn parse_searchable_fields(content: &str) -> SearchableExperimentFields {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "searchable-field reply is not JSON");
            return SearchableExperimentFields::default();
        }
    };
    let Some(obj) = value.as_object() else {
        warn!("searchable-field reply is not a JSON object");
        return SearchableExperimentFields::default();
    };

    let mut out = SearchableExperimentFields::default();
    out.subject_count = int_field(obj, "subjectCount");
    out.healthy_subject_count = int_field(obj, "healthySubjectCount");
    out.patient_subject_count = int_field(obj, "patientSubjectCount");
    out.sample_count = int_field(obj, "sampleCount");
    out.diseases = list_field(obj, "diseases");
    out.disease_categories = list_field(obj, "diseaseCategories");
    out.tissues = list_field(obj, "tissues");
    out.cell_types = list_field(obj, "cellTypes");
    out.is_tumor = bool_field(obj, "isTumor");
    out.species = list_field(obj, "species");
    out.sex = string_field(obj, "sex");
    out.age_range = string_field(obj, "ageRange");
    out.data_types = list_field(obj, "dataTypes");
    out.platforms = list_field(obj, "platforms");
    out.library_preparation = string_field(obj, "libraryPreparation");
    out.read_length = string_field(obj, "readLength");
    out.total_data_volume = string_field(obj, "totalDataVolume");
    out.variant_count = int_field(obj, "variantCount");
    out.marker_count = int_field(obj, "markerCount");
    out.target_regions = list_field(obj, "targetRegions");
    out.reference_genome = string_field(obj, "referenceGenome");
    out.analysis_software = list_field(obj, "analysisSoftware");
    out.file_formats = list_field(obj, "fileFormats");
    out.notes = string_field(obj, "notes");
    out
}

type JsonObject = serde_json::Map<String, Value>;

fn int_field(obj: &JsonObject, key: &str) -> Option<i64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_i64(),
        Some(other) => {
            debug!(key, value = %other, "non-integer count dropped");
            None
        }
    }
}

fn bool_field(obj: &JsonObject, key: &str) -> Option<bool> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            debug!(key, value = %other, "non-boolean field dropped");
            None
        }
    }
}

fn string_field(obj: &JsonObject, key: &str) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::String(_)) => None,
        Some(other) => {
            debug!(key, value = %other, "non-string field dropped");
            None
        }
    }
}

fn list_field(obj: &JsonObject, key: &str) -> Vec<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                other => {
                    debug!(key, value = %other, "non-string list entry dropped");
                    None
                }
            })
            .collect(),
        Some(other) => {
            debug!(key, value = %other, "non-array field dropped");
            Vec::new()
        }
    }
}
