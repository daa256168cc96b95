//! The [`VisionProvider`] trait every concrete provider implements, plus the
//! shared request/response types the dispatcher works with.

use std::path::Path;

use async_trait::async_trait;

use nightwatch_core::model::VideoMethod;

use crate::error::{Error, Result};
use crate::prompt::PromptContext;

/// One base64-encoded JPEG frame to send to a provider.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub base64_jpeg: String,
}

/// The outcome of one successful provider call.
#[derive(Debug, Clone)]
pub struct VisionResult {
    pub description: String,
    pub ai_confidence: Option<u8>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    /// True when the provider reported no usage and the token counts are a
    /// flat per-image estimate instead.
    pub is_estimated: bool,
}

/// A vision-capable AI backend. Each implementation owns its own HTTP
/// client and API key; the dispatcher is responsible for retry, fallback
/// and cost accounting across providers, not any individual call.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Stable identifier used in prompts, logs and `provider_used` fields.
    fn name(&self) -> &'static str;

    /// How this provider accepts whole clips: not at all, as a sequence of
    /// extracted frames, or as a native file upload.
    fn video_method(&self) -> VideoMethod {
        VideoMethod::None
    }

    /// Describes a single still frame.
    async fn describe_image(
        &self,
        image: &ImageInput,
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult>;

    /// Describes a sequence of frames as one temporal narrative.
    async fn describe_images(
        &self,
        images: &[ImageInput],
        ctx: &PromptContext<'_>,
    ) -> Result<VisionResult>;

    /// Describes a whole clip via native upload. Only meaningful for
    /// providers whose [`video_method`](Self::video_method) is
    /// [`VideoMethod::NativeUpload`]; everything else refuses.
    async fn describe_video(
        &self,
        _clip_path: &Path,
        _ctx: &PromptContext<'_>,
    ) -> Result<VisionResult> {
        Err(Error::VideoNotSupported(self.name().to_string()))
    }
}

/// Token-per-image and per-1k-token cost estimates used to compute
/// `cost_usd` for a provider call when the API doesn't report usage
/// directly (or to sanity-check/estimate cost before the call).
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub tokens_per_image: u32,
    pub price_input_per_1k: f64,
    pub price_output_per_1k: f64,
}

impl CostModel {
    /// OpenAI GPT-4o-mini-class pricing.
    pub const OPENAI: CostModel = CostModel {
        tokens_per_image: 85,
        price_input_per_1k: 0.000_15,
        price_output_per_1k: 0.000_60,
    };

    /// xAI Grok, OpenAI-compatible vision pricing.
    pub const GROK: CostModel = CostModel {
        tokens_per_image: 85,
        price_input_per_1k: 0.000_05,
        price_output_per_1k: 0.000_10,
    };

    /// Anthropic Claude 3 Haiku-class pricing.
    pub const ANTHROPIC: CostModel = CostModel {
        tokens_per_image: 1334,
        price_input_per_1k: 0.000_25,
        price_output_per_1k: 0.001_25,
    };

    /// Google Gemini Flash-class pricing.
    pub const GEMINI: CostModel = CostModel {
        tokens_per_image: 258,
        price_input_per_1k: 0.000_075,
        price_output_per_1k: 0.000_3,
    };

    /// Computes the USD cost of a call given actual token counts.
    #[must_use]
    pub fn cost_for(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = f64::from(input_tokens) / 1000.0 * self.price_input_per_1k;
        let output_cost = f64::from(output_tokens) / 1000.0 * self.price_output_per_1k;
        input_cost + output_cost
    }

    /// Flat token estimate for a call whose provider reported no usage:
    /// fixed prompt overhead, a per-image charge, and response overhead.
    #[must_use]
    pub fn estimated_call_tokens(&self, image_count: u32) -> u32 {
        200 + image_count * self.tokens_per_image + 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_cost_matches_expected_rate() {
        let cost = CostModel::OPENAI.cost_for(85, 120);
        let expected = 85.0 / 1000.0 * 0.000_15 + 120.0 / 1000.0 * 0.000_60;
        assert!((cost - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn anthropic_is_the_most_expensive_per_image() {
        assert!(CostModel::ANTHROPIC.tokens_per_image > CostModel::OPENAI.tokens_per_image);
        assert!(CostModel::ANTHROPIC.price_input_per_1k > CostModel::OPENAI.price_input_per_1k);
    }

    #[test]
    fn estimated_call_tokens_scale_with_image_count() {
        assert_eq!(CostModel::OPENAI.estimated_call_tokens(1), 200 + 85 + 100);
        assert_eq!(CostModel::OPENAI.estimated_call_tokens(5), 200 + 5 * 85 + 100);
    }
}
