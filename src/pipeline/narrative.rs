//! Narrative enrichment via a text-generation service
//!
//! Narratives are an optional step that runs after the comparison and chart
//! are on disk. Whatever the service returns is passed through unvalidated.

use crate::config::LlmConfig;
use crate::error::{FxError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const SERVICE_NAME: &str = "text-generation service";

/// Trait for text-generation backends
pub trait NarrativeGenerator {
    /// Generate text for a prompt
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> Result<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(FxError::external(SERVICE_NAME, "response contained no text"));
        }
        Ok(text)
    }
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| FxError::external(SERVICE_NAME, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// `None` when no API key is configured
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        match config.api_key.as_deref() {
            Some(key) => Self::new(config.endpoint.clone(), config.model.clone(), key).map(Some),
            None => Ok(None),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| FxError::external(SERVICE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FxError::external(
                SERVICE_NAME,
                format!("returned {}: {}", status, detail.trim()),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FxError::external(SERVICE_NAME, format!("JSON parse error: {}", e)))?;
        parsed.text()
    }
}

impl NarrativeGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send {
        self.request(prompt)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Prompt for the day-over-day executive explanation
pub fn comparison_prompt(base_currency: &str, table: &str, degraded: bool) -> String {
    let scope = if degraded {
        "No prior-day data was available, so the table only holds today's rates."
    } else {
        "Columns ending in '_CHANGE_PCT' hold the percentage change against the previous day."
    };
    format!(
        "The table below contains today's exchange rates for base currency {base}. {scope}\n\n\
         Data for analysis:\n{table}\n\
         Write an executive explanation in plain language, at most 5 lines, that interprets \
         the movement of each currency and summarises whether the {base} strengthened or \
         weakened most significantly against them.",
        base = base_currency,
        scope = scope,
        table = table
    )
}

/// Prompt for the two-paragraph insight over the latest gold snapshot
pub fn insights_prompt(base_currency: &str, table: &str) -> String {
    format!(
        "The table below contains the latest exchange rates against {base}.\n\n\
         Gold table data:\n{table}\n\
         Based on this data write two distinct paragraphs:\n\
         1. Executive summary: a simple business explanation of where the main currencies \
         stand against {base} today, focused on the current rates. Do not include the date.\n\
         2. Suggested analysis: an analysis that could be done with historical data, such as \
         volatility or month-over-month comparison.\n\n\
         Format the answer with the headings 'Executive summary:' and 'Suggested analysis:'.",
        base = base_currency,
        table = table
    )
}

/// Ask for a narrative; failures are logged and reported as `None`
pub async fn narrate<N: NarrativeGenerator>(generator: &N, prompt: &str) -> Option<String> {
    log::info!("Requesting narrative from model {}", generator.model());
    match generator.generate(prompt).await {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!("Narrative generation failed: {}", e);
            None
        }
    }
}
