//! Google Gemini Flash vision provider.
//!
//! Talks to the REST `generateContent` endpoint directly with an API-key
//! query parameter, since the provider crates in the corpus reach for
//! `reqwest` for this one rather than a generated client. Gemini is also
//! the one provider that accepts whole clips: `describe_video` uploads the
//! file, polls its processing state, then references it by URI.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use nightwatch_core::model::VideoMethod;

use crate::error::{Error, Result};
use crate::parse::parse_confidence_response;
use crate::prompt::{self, PromptContext};
use crate::provider::{CostModel, ImageInput, VisionProvider, VisionResult};

const MODEL: &str = "gemini-2.5-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// How long an uploaded clip may sit in `PROCESSING` before the call is
/// abandoned.
const UPLOAD_STATE_DEADLINE: Duration = Duration::from_secs(120);

const UPLOAD_STATE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
struct FileRef {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    Inline { inline_data: InlineData<'a> },
    File { file_data: FileRef },
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct FileUploadResponse {
    file: FileMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    name: String,
    uri: String,
    state: Option<String>,
}

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Overrides the API host, for pointing at a mock server in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{MODEL}:generateContent?key={}",
            self.base_url, self.api_key
        )
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key)
    }

    fn file_endpoint(&self, name: &str) -> String {
        format!("{}/v1beta/{name}?key={}", self.base_url, self.api_key)
    }

    async fn generate(&self, parts: Vec<Part<'_>>) -> Result<VisionResult> {
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                max_output_tokens: 500,
                temperature: 0.4,
            },
        };

        let response = self
            .http
            .post(self.generate_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                provider: "gemini".to_string(),
                status,
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            provider: "gemini".to_string(),
            message: e.to_string(),
        })?;

        let image_count = body_image_count(&body);
        let candidate = parsed.candidates.into_iter().next();
        let raw = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.clone());

        let Some(raw) = raw else {
            let finish_reason = candidate
                .and_then(|c| c.finish_reason)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(Error::MalformedResponse {
                provider: "gemini".to_string(),
                message: format!("response blocked (finish_reason: {finish_reason})"),
            });
        };

        let (description, ai_confidence) = parse_confidence_response(raw.trim());
        let (input_tokens, output_tokens, is_estimated) = match parsed.usage_metadata {
            Some(usage) => (
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
                false,
            ),
            None => (CostModel::GEMINI.estimated_call_tokens(image_count), 0, true),
        };
        let cost_usd = CostModel::GEMINI.cost_for(input_tokens, output_tokens);

        Ok(VisionResult {
            description,
            ai_confidence,
            input_tokens,
            output_tokens,
            cost_usd,
            is_estimated,
        })
    }

    async fn call(&self, system: &str, user_text: &str, images: &[ImageInput]) -> Result<VisionResult> {
        let mut parts = vec![Part::Text {
            text: format!("{system}\n\n{user_text}"),
        }];
        for image in images {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: "image/jpeg",
                    data: &image.base64_jpeg,
                },
            });
        }
        self.generate(parts).await
    }

    /// Uploads `clip_path` to the files API and returns its metadata.
    async fn upload_clip(&self, clip_path: &Path) -> Result<FileMetadata> {
        let bytes = tokio::fs::read(clip_path).await.map_err(|e| Error::Request {
            provider: "gemini".to_string(),
            message: format!("failed to read clip {}: {e}", clip_path.display()),
        })?;

        let response = self
            .http
            .post(self.upload_endpoint())
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Request {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                provider: "gemini".to_string(),
                status,
                body,
            });
        }

        let parsed: FileUploadResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            provider: "gemini".to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed.file)
    }

    /// Polls the uploaded file until it leaves `PROCESSING`, failing once
    /// the probe deadline passes or the file lands in `FAILED`.
    async fn await_file_active(&self, mut file: FileMetadata) -> Result<FileMetadata> {
        let deadline = Instant::now() + UPLOAD_STATE_DEADLINE;
        loop {
            match file.state.as_deref() {
                None | Some("ACTIVE") => return Ok(file),
                Some("FAILED") => {
                    return Err(Error::VideoProcessing {
                        provider: "gemini".to_string(),
                        message: format!("file {} failed server-side processing", file.name),
                    })
                }
                Some(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(Error::VideoProcessing {
                    provider: "gemini".to_string(),
                    message: format!("file {} still processing after probe deadline", file.name),
                });
            }
            tokio::time::sleep(UPLOAD_STATE_POLL_INTERVAL).await;

            let response = self
                .http
                .get(self.file_endpoint(&file.name))
                .send()
                .await
                .map_err(|e| Error::Request {
                    provider: "gemini".to_string(),
                    message: e.to_string(),
                })?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Http {
                    provider: "gemini".to_string(),
                    status,
                    body,
                });
            }
            file = response.json().await.map_err(|e| Error::MalformedResponse {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;
        }
    }
}

fn body_image_count(body: &GenerateContentRequest<'_>) -> u32 {
    body.contents
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter(|p| matches!(p, Part::Inline { .. }))
        .count() as u32
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn video_method(&self) -> VideoMethod {
        VideoMethod::NativeUpload
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

    async fn describe_video(
        &self,
        clip_path: &Path,
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        let uploaded = self.upload_clip(clip_path).await?;
        let active = self.await_file_active(uploaded).await?;

        let prompt = prompt::video(ctx);
        let parts = vec![
            Part::Text {
                text: format!("{}\n\n{}", prompt.system, prompt.user),
            },
            Part::File {
                file_data: FileRef {
                    mime_type: "video/mp4".to_string(),
                    file_uri: active.uri,
                },
            },
        ];
        self.generate(parts).await
    }
}
