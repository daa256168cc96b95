//! Multi-provider AI vision dispatch.
//!
//! Builds prompts, calls out to whichever provider chain is configured with
//! per-provider retry and an overall SLA budget, and parses the result back
//! into a description plus an optional self-reported confidence score. Cost
//! accounting and fallback bookkeeping live here; persistence and pipeline
//! orchestration are the caller's job.

pub mod dispatch;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod quality;

pub use dispatch::{
    dispatch_multi_frame, dispatch_single_frame, dispatch_video_frames, dispatch_video_native,
    find_video_provider, AttemptRecord, DispatchOutcome,
};
pub use error::{Error, Result};
pub use provider::{CostModel, ImageInput, VisionProvider, VisionResult};
pub use quality::detect_vague_description;

use nightwatch_core::config::ProviderKeys;

/// Builds the ordered provider chain from the configured fallback order,
/// skipping any provider whose API key isn't configured.
#[must_use]
pub fn build_provider_chain(
    order: &[String],
    keys: &ProviderKeys,
) -> Vec<Box<dyn VisionProvider>> {
    let mut chain: Vec<Box<dyn VisionProvider>> = Vec::new();
    for name in order {
        let provider: Option<Box<dyn VisionProvider>> = match name.as_str() {
            "openai" => keys
                .openai
                .clone()
                .map(|key| Box::new(providers::OpenAiCompatibleProvider::openai(key)) as _),
            "anthropic" => keys
                .anthropic
                .clone()
                .map(|key| Box::new(providers::AnthropicProvider::new(key)) as _),
            "gemini" => keys
                .gemini
                .clone()
                .map(|key| Box::new(providers::GeminiProvider::new(key)) as _),
            "grok" => keys
                .grok
                .clone()
                .map(|key| Box::new(providers::OpenAiCompatibleProvider::grok(key)) as _),
            other => {
                tracing::warn!(provider = other, "unknown provider name in provider order, skipping");
                None
            }
        };
        if let Some(provider) = provider {
            chain.push(provider);
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_unconfigured_providers() {
        let keys = ProviderKeys {
            openai: Some("sk-test".to_string()),
            anthropic: None,
            gemini: Some("gk-test".to_string()),
            grok: None,
        };
        let order = vec![
            "openai".to_string(),
            "anthropic".to_string(),
            "gemini".to_string(),
            "grok".to_string(),
        ];
        let chain = build_provider_chain(&order, &keys);
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["openai", "gemini"]);
    }

    #[test]
    fn unknown_provider_name_is_skipped_not_fatal() {
        let keys = ProviderKeys {
            openai: Some("sk-test".to_string()),
            anthropic: None,
            gemini: None,
            grok: None,
        };
        let order = vec!["openai".to_string(), "bogus".to_string()];
        let chain = build_provider_chain(&order, &keys);
        assert_eq!(chain.len(), 1);
    }
}
