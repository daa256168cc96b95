//! Anthropic Claude vision provider.
//!
//! Uses a plain `reqwest` client against the Messages API rather than an
//! SDK crate, the same call the rest of the corpus makes for this provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::parse::parse_confidence_response;
use crate::prompt::{self, PromptContext};
use crate::provider::{CostModel, ImageInput, VisionProvider, VisionResult};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-haiku-20240307";

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: String },
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Claude 3 Haiku, used here purely for vision description (no tool use, no
/// streaming — the dispatcher always wants a complete response).
pub struct AnthropicProvider {
    api_key: String,
    http: reqwest::Client,
}

impl AnthropicProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }

    async fn call(&self, system: &str, user_text: &str, images: &[ImageInput]) -> Result<VisionResult> {
        let mut content: Vec<ContentBlock<'_>> = Vec::with_capacity(images.len() + 1);
        for image in images {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: "image/jpeg",
                    data: &image.base64_jpeg,
                },
            });
        }
        content.push(ContentBlock::Text {
            text: format!("{system}\n\n{user_text}"),
        });

        let body = json!({
            "model": MODEL,
            "max_tokens": if images.len() > 1 { 500 } else { 300 },
            "messages": [{"role": "user", "content": content}],
        });

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request {
                provider: "anthropic".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                provider: "anthropic".to_string(),
                status,
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            provider: "anthropic".to_string(),
            message: e.to_string(),
        })?;

        let raw = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default();
        let (description, ai_confidence) = parse_confidence_response(raw.trim());

        let (input_tokens, output_tokens, is_estimated) = match parsed.usage {
            Some(u) => (u.input_tokens, u.output_tokens, false),
            None => (CostModel::ANTHROPIC.estimated_call_tokens(images.len() as u32), 0, true),
        };
        let cost_usd = CostModel::ANTHROPIC.cost_for(input_tokens, output_tokens);

        Ok(VisionResult {
            description,
            ai_confidence,
            input_tokens,
            output_tokens,
            cost_usd,
            is_estimated,
        })
    }
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn describe_image(
        &self,
        image: &ImageInput,
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        let prompt = prompt::single_frame(ctx);
        self.call(&prompt.system, &prompt.user, std::slice::from_ref(image))
            .await
    }

    async fn describe_images(
        &self,
        images: &[ImageInput],
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        let prompt = prompt::multi_frame(ctx, images.len());
        self.call(&prompt.system, &prompt.user, images).await
    }
}
