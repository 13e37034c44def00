//! Direct-API provider (Bocha-style) — spec.md section 4.2.
//!
//! Grounded on `original_source/llm_sentry_monitor/providers/bocha_api.py`:
//! a single authenticated POST to a web-search endpoint, then a tolerant
//! parse of whichever top-level key the response actually used for the
//! summary/expansion-terms/citations triple.
//!
//! **Deviation from the Python original, kept deliberately** (see
//! DESIGN.md): the original defaults `queries` to `[keyword]` when the
//! response carries none. spec.md's E1 scenario requires zero
//! `SearchQuery` rows for a response with no expansion terms, so this
//! provider leaves `sub_queries` empty in that case instead.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;
use crate::domain::models::{RawCitation, SearchOutput, TaskSettings};
use crate::domain::ports::provider::Provider;

pub struct BochaProvider {
    client: reqwest::Client,
    api_key: String,
    api_base_url: String,
}

impl BochaProvider {
    #[must_use]
    pub fn new(api_key: String, api_base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            api_base_url,
        }
    }
}

#[async_trait]
impl Provider for BochaProvider {
    fn name(&self) -> &'static str {
        "bocha"
    }

    async fn search(
        &self,
        keyword: &str,
        prompt: &str,
        settings: &TaskSettings,
        cancel: CancellationToken,
    ) -> Result<SearchOutput, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Provider(
                "BOCHA_API_KEY is not configured".to_string(),
            ));
        }

        let url = format!("{}/v1/web-search", self.api_base_url);
        let query = if prompt.is_empty() { keyword } else { prompt };
        let body = serde_json::json!({
            "query": query,
            "summary": true,
            "freshness": "noLimit",
            "count": 10,
        });

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .json(&body)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| ProviderError::Provider(format!("bocha request: {e}")))?,
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthRequired);
        }
        if !response.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "bocha responded with status {}",
                response.status()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("bocha response decode: {e}")))?;

        Ok(parse_bocha_response(&data))
    }
}

fn parse_bocha_response(data: &Value) -> SearchOutput {
    let answer_text = extract_answer_text(data);
    let sub_queries = extract_sub_queries(data);
    let citations = extract_citations(data);

    SearchOutput {
        answer_text,
        sub_queries,
        citations,
    }
}

fn extract_answer_text(data: &Value) -> String {
    if let Some(summary) = data.get("summary") {
        if let Some(s) = summary.as_str() {
            return s.to_string();
        }
        if let Some(obj) = summary.as_object() {
            return obj
                .get("text")
                .or_else(|| obj.get("content"))
                .or_else(|| obj.get("summary"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
    }
    for key in ["answer", "content", "text"] {
        if let Some(s) = data.get(key).and_then(Value::as_str) {
            return s.to_string();
        }
    }
    if let Some(response) = data.get("response") {
        if let Some(s) = response.as_str() {
            return s.to_string();
        }
        if let Some(obj) = response.as_object() {
            return obj
                .get("text")
                .or_else(|| obj.get("content"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
    }
    String::new()
}

fn extract_sub_queries(data: &Value) -> Vec<String> {
    let raw = data.get("queries").or_else(|| data.get("search_queries"));
    match raw {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

/// The first present key among `results`/`items`/`citations`/`references`
/// wins — the Python original inspects them with `elif`, never merging
/// more than one source per response.
fn extract_citations(data: &Value) -> Vec<RawCitation> {
    for key in ["results", "items", "citations", "references"] {
        if let Some(arr) = data.get(key).and_then(Value::as_array) {
            return arr
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| parse_citation_entry(entry, i))
                .collect();
        }
    }
    Vec::new()
}

fn parse_citation_entry(value: &Value, position: usize) -> Option<RawCitation> {
    let url = value
        .get("url")
        .or_else(|| value.get("link"))
        .or_else(|| value.get("href"))
        .and_then(Value::as_str)?;
    if url.is_empty() {
        return None;
    }

    let title = value
        .get("title")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let snippet = value
        .get("snippet")
        .or_else(|| value.get("description"))
        .or_else(|| value.get("summary"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let site_name = value
        .get("site_name")
        .or_else(|| value.get("source"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let cite_index = value
        .get("cite_index")
        .or_else(|| value.get("index"))
        .and_then(Value::as_i64)
        .map_or(position as i32 + 1, |n| n as i32);
    let query_indexes = value
        .get("query_indexes")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_i64).map(|n| n as i32).collect())
        .unwrap_or_default();

    Some(RawCitation {
        url: url.to_string(),
        title,
        snippet,
        site_name,
        cite_index,
        query_indexes,
    })
}
