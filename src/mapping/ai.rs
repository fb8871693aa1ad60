//! AI-assisted mapping suggestions
//!
//! An external model may propose column assignments. Its answer is only a
//! proposal: [`AiMappingAdapter`] sends it through the same validation gate as
//! every other mapping, and falls back to the heuristic mapper when the
//! service fails.

use super::{AutoMapper, MappingOrigin, ValidatedMapping, validate};
use crate::api::RemoteError;
use crate::api::error::extract_error_message;
use crate::api::resilience::{RetryConfig, RetryPolicy};
use crate::catalog::FieldCatalog;
use crate::source::SourceRow;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

const SAMPLE_ROWS: usize = 3;
const SAMPLE_CHARS: usize = 50;

/// Source of `(source column, target field)` proposals
#[async_trait]
pub trait MappingSuggester: Send + Sync {
    async fn suggest_mapping(
        &self,
        sample_rows: &[SourceRow],
        columns: &[String],
        catalog: &FieldCatalog,
    ) -> Result<Vec<(String, String)>>;
}

/// Routes suggestions of a [`MappingSuggester`] through the validation gate
pub struct AiMappingAdapter<S> {
    suggester: S,
}

impl<S: MappingSuggester> AiMappingAdapter<S> {
    pub fn new(suggester: S) -> Self {
        Self { suggester }
    }

    pub async fn suggest(
        &self,
        columns: &[String],
        sample_rows: &[SourceRow],
        catalog: &FieldCatalog,
    ) -> Result<ValidatedMapping> {
        let proposal = self
            .suggester
            .suggest_mapping(sample_rows, columns, catalog)
            .await?;
        debug!("AI proposed {} assignments", proposal.len());

        Ok(validate(
            proposal.iter().map(|(s, t)| (s.as_str(), t.as_str())),
            MappingOrigin::Ai,
            columns,
            catalog,
        ))
    }

    /// AI suggestion, or the heuristic mapping if the service fails or
    /// proposes nothing usable
    pub async fn suggest_or_fallback(
        &self,
        columns: &[String],
        sample_rows: &[SourceRow],
        catalog: &FieldCatalog,
        fallback: &AutoMapper,
    ) -> ValidatedMapping {
        match self.suggest(columns, sample_rows, catalog).await {
            Ok(mapping) if !mapping.mapping().is_empty() => mapping,
            Ok(_) => {
                warn!("AI mapping was empty, using heuristic mapping");
                fallback.suggest(columns, catalog)
            }
            Err(e) => {
                warn!("AI mapping failed ({:#}), using heuristic mapping", e);
                fallback.suggest(columns, catalog)
            }
        }
    }
}

/// Google Gemini based suggester
pub struct GeminiSuggester {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiSuggester {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: GEMINI_MODEL.to_string(),
            retry: RetryPolicy::new(RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_secs(5),
                ..RetryConfig::default()
            }),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.1,
                "topK": 1,
                "topP": 0.8,
                "maxOutputTokens": 2048,
            }
        });

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::http(
                status.as_u16(),
                extract_error_message(status.as_u16(), &body),
            ));
        }

        let data: Value =
            serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        data.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::InvalidResponse("no answer from model".into()))
    }
}

#[async_trait]
impl MappingSuggester for GeminiSuggester {
    async fn suggest_mapping(
        &self,
        sample_rows: &[SourceRow],
        columns: &[String],
        catalog: &FieldCatalog,
    ) -> Result<Vec<(String, String)>> {
        let prompt = build_prompt(columns, sample_rows, catalog);
        info!("Requesting mapping suggestion from {}", self.model);

        let answer = self
            .retry
            .execute("Gemini generateContent", || self.generate(&prompt))
            .await
            .context("AI mapping request failed")?;

        parse_suggestion_response(&answer, columns)
    }
}

/// Prompt describing the target fields and the source columns with samples
pub fn build_prompt(columns: &[String], sample_rows: &[SourceRow], catalog: &FieldCatalog) -> String {
    let targets: Vec<String> = catalog
        .fields()
        .iter()
        .map(|f| {
            let mut line = format!("- {}: {} ({:?})", f.name, f.label, f.kind);
            if f.required {
                line.push_str(" REQUIRED");
            }
            if f.is_custom {
                line.push_str(" CUSTOM");
            }
            line
        })
        .collect();

    let sources: Vec<String> = columns
        .iter()
        .map(|column| {
            let samples: Vec<String> = sample_rows
                .iter()
                .take(SAMPLE_ROWS)
                .filter_map(|row| row.get(column))
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.chars().take(SAMPLE_CHARS).collect())
                .collect();
            if samples.is_empty() {
                format!("- {}", column)
            } else {
                format!("- {} (examples: {})", column, samples.join(", "))
            }
        })
        .collect();

    format!(
        "You map columns of product import files to ERPNext item fields.\n\n\
         SOURCE COLUMNS:\n{}\n\n\
         TARGET FIELDS:\n{}\n\n\
         RULES:\n\
         1. Each source column maps to at most ONE target field.\n\
         2. Leave out columns without a fitting field.\n\
         3. Judge by meaning and by the example values, not only by name.\n\
         4. CUSTOM fields are site specific; use them when they fit.\n\n\
         Answer with a JSON object only, no explanation:\n\
         {{\"source column\": \"target_field\"}}",
        sources.join("\n"),
        targets.join("\n")
    )
}

/// Parse the model's JSON answer into pairs ordered like `columns`.
///
/// Markdown code fences and a leading `json` tag are stripped. Non-string
/// values are ignored; unknown names are left for the validation gate.
pub fn parse_suggestion_response(answer: &str, columns: &[String]) -> Result<Vec<(String, String)>> {
    let mut text = answer.trim();
    if text.starts_with("```") {
        text = text.trim_start_matches('`');
        text = text.trim_end().trim_end_matches('`');
    }
    let text = text.trim_start();
    let text = text.strip_prefix("json").unwrap_or(text).trim();

    let object: serde_json::Map<String, Value> = serde_json::from_str(text)
        .map_err(|e| anyhow!("AI answer is not a JSON object: {}", e))?;

    let mut pairs: Vec<(String, String)> = object
        .into_iter()
        .filter_map(|(source, target)| target.as_str().map(|t| (source, t.to_string())))
        .collect();
    pairs.sort_by_key(|(source, _)| {
        columns
            .iter()
            .position(|c| c == source)
            .unwrap_or(usize::MAX)
    });
    Ok(pairs)
}
