//! Gemini `generateContent` adapter for the ordering oracle.

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::traits::OrderingOracle;

const SYSTEM_INSTRUCTION: &str = "You are a route optimization expert. Your only output is a \
JSON object that strictly follows the requested structure. Never include text or explanations \
outside the JSON.";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            temperature: 0.1,
        }
    }
}

impl GeminiConfig {
    /// Reads `GEMINI_API_KEY` (required) and `GEMINI_MODEL` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::validation("GEMINI_API_KEY is not set"))?;
        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "responseMimeType": "application/json",
            },
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        })
    }
}

impl OrderingOracle for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(url)
            // Keep the key out of the URL; transport errors print it.
            .header("x-goog-api-key", self.config.api_key.as_str())
            .json(&self.request_body(prompt))
            .send()?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<GenerateResponse>()
                .ok()
                .and_then(|body| body.error)
                .map(|error| error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        first_text(response.json::<GenerateResponse>()?)
    }
}

fn first_text(body: GenerateResponse) -> Result<String> {
    body.candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| Error::malformed("oracle answer has no text"))
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
