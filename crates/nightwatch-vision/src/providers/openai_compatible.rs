//! Shared client for OpenAI and any OpenAI-compatible chat-completions API
//! (xAI's Grok vision models speak the same wire format).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use nightwatch_core::model::VideoMethod;

use crate::error::{Error, Result};
use crate::parse::parse_confidence_response;
use crate::prompt::{self, PromptContext};
use crate::provider::{CostModel, ImageInput, VisionProvider, VisionResult};

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

/// A chat-completions-style vision client: OpenAI proper, or any
/// OpenAI-compatible endpoint (Grok) reachable with a bearer token.
pub struct OpenAiCompatibleProvider {
    name: &'static str,
    model: &'static str,
    base_url: String,
    api_key: String,
    cost_model: CostModel,
    http: reqwest::Client,
    max_tokens_single: u32,
    max_tokens_multi: u32,
}

impl OpenAiCompatibleProvider {
    #[must_use]
    pub fn openai(api_key: String) -> Self {
        Self {
            name: "openai",
            model: "gpt-4o-mini",
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key,
            cost_model: CostModel::OPENAI,
            http: reqwest::Client::new(),
            max_tokens_single: 300,
            max_tokens_multi: 500,
        }
    }

    /// Overrides the endpoint URL, for pointing at a mock server in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn grok(api_key: String) -> Self {
        Self {
            name: "grok",
            model: "grok-2-vision-1212",
            base_url: "https://api.x.ai/v1/chat/completions".to_string(),
            api_key,
            cost_model: CostModel::GROK,
            http: reqwest::Client::new(),
            max_tokens_single: 300,
            max_tokens_multi: 500,
        }
    }

    async fn call(
        &self,
        system: &str,
        user_text: &str,
        images: &[ImageInput],
        max_tokens: u32,
    ) -> Result<VisionResult> {
        let mut content: Vec<ContentPart<'_>> = vec![ContentPart::Text { text: user_text }];
        let data_urls: Vec<String> = images
            .iter()
            .map(|img| format!("data:image/jpeg;base64,{}", img.base64_jpeg))
            .collect();
        for url in &data_urls {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            });
        }

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": content},
            ],
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request {
                provider: self.name.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                provider: self.name.to_string(),
                status,
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            provider: self.name.to_string(),
            message: e.to_string(),
        })?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let (description, ai_confidence) = parse_confidence_response(raw.trim());

        let (input_tokens, output_tokens, is_estimated) = match parsed.usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens, false),
            None => (self.cost_model.estimated_call_tokens(images.len() as u32), 0, true),
        };
        let cost_usd = self.cost_model.cost_for(input_tokens, output_tokens);

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
impl VisionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    /// Chat-completions APIs take no clip uploads; clips reach them as an
    /// extracted frame sequence.
    fn video_method(&self) -> VideoMethod {
        VideoMethod::FrameExtraction
    }

    async fn describe_image(
        &self,
        image: &ImageInput,
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        let prompt = prompt::single_frame(ctx);
        self.call(&prompt.system, &prompt.user, std::slice::from_ref(image), self.max_tokens_single)
            .await
    }

    async fn describe_images(
        &self,
        images: &[ImageInput],
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        let prompt = prompt::multi_frame(ctx, images.len());
        self.call(&prompt.system, &prompt.user, images, self.max_tokens_multi)
            .await
    }
}
