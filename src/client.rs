use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TryOnConfig;
use crate::encoder::DataUrl;
use crate::error::{Result, TryOnError};
use crate::prompt::{self, TRY_ON_INSTRUCTION};
use crate::types::{is_inline_source, ImageReference};

/// The two remote operations the wizard depends on.
///
/// Implemented by [`GeminiClient`]; tests and alternative backends can supply
/// their own.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Create a standalone garment image from a text description.
    async fn synthesize_garment(&self, prompt_text: &str) -> Result<ImageReference>;

    /// Dress the person in the garment. Both arguments must be data URLs.
    async fn synthesize_try_on(
        &self,
        person_inline: &str,
        garment_inline: &str,
    ) -> Result<ImageReference>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl Part {
    fn image(data_url: &DataUrl) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: data_url.mime_type.clone(),
                data: data_url.data.clone(),
            },
        }
    }
}

/// Async client for the Gemini `generateContent` image endpoint.
///
/// # Example
/// ```no_run
/// use virtual_tryon::{GeminiClient, ImageGenerator, TryOnConfig};
///
/// # async fn example() -> virtual_tryon::Result<()> {
/// let client = GeminiClient::new(TryOnConfig::from_env()?)?;
/// let garment = client.synthesize_garment("red silk gown").await?;
/// assert!(garment.is_generated());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    config: TryOnConfig,
}

impl GeminiClient {
    /// Create a client from a validated config.
    pub fn new(config: TryOnConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http: Client::new(),
            config,
        })
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Returns the full `generateContent` URL for the configured model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    // ── Transport ───────────────────────────────────────────────────

    async fn generate(&self, parts: Vec<Part>, id_prefix: &str) -> Result<ImageReference> {
        let body = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let url = self.generate_url();
        debug!(model = %self.config.model, "sending generateContent request");

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| TryOnError::Network {
                context: format!(
                    "Cannot reach generation API at {}",
                    self.config.endpoint
                ),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            warn!(status, "generation API returned an error");
            return Err(TryOnError::Remote {
                status,
                body: body_text,
            });
        }

        let json: Value = resp.json().await.map_err(|e| TryOnError::Network {
            context: "Failed to read generateContent response".into(),
            source: e,
        })?;

        let data_url = extract_inline_image(&json)?;
        info!(kind = id_prefix, "image generated");
        Ok(ImageReference::generated(
            format!("{}-{}", id_prefix, uuid::Uuid::new_v4()),
            data_url,
        ))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn synthesize_garment(&self, prompt_text: &str) -> Result<ImageReference> {
        let text = prompt::garment_prompt(prompt_text).ok_or(TryOnError::EmptyPrompt)?;
        self.generate(vec![Part::Text { text }], "gen-garment").await
    }

    async fn synthesize_try_on(
        &self,
        person_inline: &str,
        garment_inline: &str,
    ) -> Result<ImageReference> {
        let person = require_inline("person", person_inline)?;
        let garment = require_inline("garment", garment_inline)?;

        let parts = vec![
            Part::image(&person),
            Part::image(&garment),
            Part::Text {
                text: TRY_ON_INSTRUCTION.to_string(),
            },
        ];
        self.generate(parts, "result").await
    }
}

fn require_inline(label: &str, source: &str) -> Result<DataUrl> {
    if !is_inline_source(source) {
        return Err(TryOnError::Decode(format!(
            "{} image must be inline-encoded before generation",
            label
        )));
    }
    DataUrl::parse(source)
}

/// Pull the first inline image out of a `generateContent` response and
/// render it as a data URL.
pub fn extract_inline_image(json: &Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    for part in parts {
        let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
        if let Some(data) = inline
            .and_then(|i| i.get("data"))
            .and_then(|d| d.as_str())
            .filter(|d| !d.is_empty())
        {
            let mime = inline
                .and_then(|i| i.get("mimeType").or_else(|| i.get("mime_type")))
                .and_then(|m| m.as_str())
                .unwrap_or("image/png");
            return Ok(format!("data:{};base64,{}", mime, data));
        }
    }

    let mut reason = String::from("response contained no image part");
    if let Some(block) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        reason = format!("prompt blocked: {}", block);
    } else if let Some(text) = parts
        .iter()
        .find_map(|p| p.get("text").and_then(|t| t.as_str()))
    {
        reason = format!("model replied with text only: {}", text.trim());
    }
    Err(TryOnError::NoImageReturned(reason))
}
