//! Fallback chain dispatch across the configured provider order.
//!
//! Each provider in the chain is tried with its own retry policy; a whole
//! chain aborts early once its SLA budget is spent, rather than letting
//! retries of an earlier provider starve later providers of their chance.
//! Every provider attempt — success or failure — is captured as an
//! [`AttemptRecord`] so the caller can append it to the usage log.

use std::path::Path;
use std::time::{Duration, Instant};

use nightwatch_core::model::VideoMethod;
use nightwatch_core::retry::{is_retryable_http_marker, with_retry_if, RetryPolicy};
use tracing::{info, warn};

use crate::error::Error;
use crate::prompt::PromptContext;
use crate::provider::{ImageInput, VisionProvider, VisionResult};

/// SLA budget for a single-frame analysis chain.
pub const SLA_SINGLE_FRAME: Duration = Duration::from_secs(5);
/// SLA budget for a multi-frame temporal-narrative chain.
pub const SLA_MULTI_FRAME: Duration = Duration::from_secs(10);
/// Hard ceiling for a native video upload or video frame-sequence dispatch.
pub const SLA_VIDEO_NATIVE: Duration = Duration::from_secs(30);

/// Synthetic `provider_used` value stamped when the SLA budget runs out
/// before any provider succeeds.
pub const TIMEOUT_PROVIDER: &str = "timeout";

/// One provider attempt (post-retry outcome), for the usage log.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider: String,
    pub success: bool,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub response_time_ms: u64,
    pub cost_usd: Option<f64>,
    pub error: Option<String>,
    pub is_estimated: bool,
    pub image_count: u32,
}

/// The terminal outcome of dispatching across the whole provider chain.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: Option<VisionResult>,
    pub provider_used: Option<String>,
    /// `provider:reason` entries accumulated for every provider that was
    /// tried and failed, in attempt order.
    pub failure_trail: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
}

impl DispatchOutcome {
    fn failed(failure_trail: Vec<String>, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            result: None,
            provider_used: None,
            failure_trail,
            attempts,
        }
    }

    fn timed_out(mut failure_trail: Vec<String>, attempts: Vec<AttemptRecord>) -> Self {
        failure_trail.push("sla_timeout".to_string());
        Self {
            result: None,
            provider_used: Some(TIMEOUT_PROVIDER.to_string()),
            failure_trail,
            attempts,
        }
    }

    /// Whether the chain was cut short by its SLA budget rather than by
    /// provider failures.
    #[must_use]
    pub fn hit_sla_timeout(&self) -> bool {
        self.provider_used.as_deref() == Some(TIMEOUT_PROVIDER)
    }
}

fn retry_policy_for(provider_name: &str) -> RetryPolicy {
    if provider_name == "grok" {
        RetryPolicy::grok()
    } else {
        RetryPolicy::provider_default()
    }
}

fn is_retryable(err: &Error) -> bool {
    is_retryable_http_marker(&err.to_string())
}

fn failure_reason(err: &Error) -> &'static str {
    match err {
        Error::NotConfigured(_) => "not_configured",
        Error::Request { .. } => "request_failed",
        Error::Http { .. } => "http_error",
        Error::MalformedResponse { .. } => "malformed_response",
        Error::VideoNotSupported(_) => "video_not_supported",
        Error::VideoProcessing { .. } => "video_processing_stuck",
        Error::AllProvidersFailed(_) => "all_providers_failed",
    }
}

enum ChainOp<'a> {
    Single(&'a ImageInput),
    Multi(&'a [ImageInput]),
}

impl ChainOp<'_> {
    fn image_count(&self) -> u32 {
        match self {
            ChainOp::Single(_) => 1,
            ChainOp::Multi(images) => images.len() as u32,
        }
    }
}

fn record_attempt(
    attempts: &mut Vec<AttemptRecord>,
    provider: &str,
    started: Instant,
    image_count: u32,
    outcome: &Result<VisionResult, Error>,
) {
    let response_time_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(result) => attempts.push(AttemptRecord {
            provider: provider.to_string(),
            success: true,
            input_tokens: result.input_tokens,
            output_tokens: result.output_tokens,
            response_time_ms,
            cost_usd: Some(result.cost_usd),
            error: None,
            is_estimated: result.is_estimated,
            image_count,
        }),
        Err(err) => attempts.push(AttemptRecord {
            provider: provider.to_string(),
            success: false,
            input_tokens: 0,
            output_tokens: 0,
            response_time_ms,
            cost_usd: None,
            error: Some(err.to_string()),
            is_estimated: false,
            image_count,
        }),
    }
}

async fn dispatch_chain(
    providers: &[Box<dyn VisionProvider>],
    op: ChainOp<'_>,
    ctx: &PromptContext<'_>,
    sla_budget: Duration,
) -> DispatchOutcome {
    if providers.is_empty() {
        return DispatchOutcome::failed(vec!["no_providers_configured".to_string()], Vec::new());
    }

    let started = Instant::now();
    let mut failure_trail = Vec::new();
    let mut attempts = Vec::new();
    let image_count = op.image_count();

    for provider in providers {
        let elapsed = started.elapsed();
        if elapsed >= sla_budget {
            warn!(?elapsed, ?sla_budget, "SLA budget exhausted, aborting fallback chain");
            return DispatchOutcome::timed_out(failure_trail, attempts);
        }

        let policy = retry_policy_for(provider.name());
        let label = provider.name().to_string();
        let attempt_started = Instant::now();
        let outcome = match &op {
            ChainOp::Single(image) => {
                with_retry_if(&policy, &label, is_retryable, || {
                    provider.describe_image(image, ctx)
                })
                .await
            }
            ChainOp::Multi(images) => {
                with_retry_if(&policy, &label, is_retryable, || {
                    provider.describe_images(images, ctx)
                })
                .await
            }
        };
        record_attempt(&mut attempts, provider.name(), attempt_started, image_count, &outcome);

        match outcome {
            Ok(result) => {
                let total_elapsed = started.elapsed();
                if total_elapsed > sla_budget {
                    warn!(?total_elapsed, ?sla_budget, provider = provider.name(), "SLA violation");
                }
                info!(provider = provider.name(), cost_usd = result.cost_usd, "vision call succeeded");
                return DispatchOutcome {
                    result: Some(result),
                    provider_used: Some(provider.name().to_string()),
                    failure_trail,
                    attempts,
                };
            }
            Err(err) => {
                failure_trail.push(format!("{}:{}", provider.name(), failure_reason(&err)));
            }
        }
    }

    DispatchOutcome::failed(failure_trail, attempts)
}

/// Dispatches a single-frame description request across `providers` in
/// order, respecting `sla_budget` as a wall-clock ceiling across the whole
/// chain (not per provider).
pub async fn dispatch_single_frame(
    providers: &[Box<dyn VisionProvider>],
    image: &ImageInput,
    ctx: &PromptContext<'_>,
    sla_budget: Duration,
) -> DispatchOutcome {
    dispatch_chain(providers, ChainOp::Single(image), ctx, sla_budget).await
}

/// Dispatches a multi-frame description request across `providers` in
/// order, under the same SLA-budget rule as [`dispatch_single_frame`].
pub async fn dispatch_multi_frame(
    providers: &[Box<dyn VisionProvider>],
    images: &[ImageInput],
    ctx: &PromptContext<'_>,
    sla_budget: Duration,
) -> DispatchOutcome {
    dispatch_chain(providers, ChainOp::Multi(images), ctx, sla_budget).await
}

/// First provider in the chain that can accept a whole clip, along with
/// how it wants to receive one.
#[must_use]
pub fn find_video_provider(
    providers: &[Box<dyn VisionProvider>],
) -> Option<(&dyn VisionProvider, VideoMethod)> {
    providers.iter().find_map(|p| match p.video_method() {
        VideoMethod::None => None,
        method => Some((p.as_ref(), method)),
    })
}

/// Native-upload video dispatch against one provider, hard-capped at
/// `sla_budget` wall-clock (upload, processing probe and inference all
/// count against it).
pub async fn dispatch_video_native(
    provider: &dyn VisionProvider,
    clip_path: &Path,
    ctx: &PromptContext<'_>,
    sla_budget: Duration,
) -> DispatchOutcome {
    let policy = retry_policy_for(provider.name());
    let label = provider.name().to_string();
    let attempt_started = Instant::now();
    let outcome = tokio::time::timeout(
        sla_budget,
        with_retry_if(&policy, &label, is_retryable, || {
            provider.describe_video(clip_path, ctx)
        }),
    )
    .await;

    let mut attempts = Vec::new();
    match outcome {
        Err(_) => {
            warn!(provider = provider.name(), ?sla_budget, "video dispatch timed out");
            DispatchOutcome::timed_out(Vec::new(), attempts)
        }
        Ok(result) => {
            record_attempt(&mut attempts, provider.name(), attempt_started, 0, &result);
            match result {
                Ok(result) => {
                    info!(provider = provider.name(), cost_usd = result.cost_usd, "video call succeeded");
                    DispatchOutcome {
                        result: Some(result),
                        provider_used: Some(provider.name().to_string()),
                        failure_trail: Vec::new(),
                        attempts,
                    }
                }
                Err(err) => DispatchOutcome::failed(
                    vec![format!("{}:{}", provider.name(), failure_reason(&err))],
                    attempts,
                ),
            }
        }
    }
}

/// Frame-extraction video dispatch: the caller has already sampled frames
/// from the clip and the provider sees a multi-image call, but under the
/// video SLA rather than the multi-frame one.
pub async fn dispatch_video_frames(
    provider: &dyn VisionProvider,
    images: &[ImageInput],
    ctx: &PromptContext<'_>,
    sla_budget: Duration,
) -> DispatchOutcome {
    let policy = retry_policy_for(provider.name());
    let label = provider.name().to_string();
    let attempt_started = Instant::now();
    let outcome = tokio::time::timeout(
        sla_budget,
        with_retry_if(&policy, &label, is_retryable, || {
            provider.describe_images(images, ctx)
        }),
    )
    .await;

    let mut attempts = Vec::new();
    match outcome {
        Err(_) => {
            warn!(provider = provider.name(), ?sla_budget, "video frame dispatch timed out");
            DispatchOutcome::timed_out(Vec::new(), attempts)
        }
        Ok(result) => {
            record_attempt(&mut attempts, provider.name(), attempt_started, images.len() as u32, &result);
            match result {
                Ok(result) => DispatchOutcome {
                    result: Some(result),
                    provider_used: Some(provider.name().to_string()),
                    failure_trail: Vec::new(),
                    attempts,
                },
                Err(err) => DispatchOutcome::failed(
                    vec![format!("{}:{}", provider.name(), failure_reason(&err))],
                    attempts,
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        name: &'static str,
        fail_times: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VisionProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn describe_image(
            &self,
            _image: &ImageInput,
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(Error::Http {
                    provider: self.name.to_string(),
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(VisionResult {
                    description: "A person walks by.".to_string(),
                    ai_confidence: Some(80),
                    input_tokens: 85,
                    output_tokens: 40,
                    cost_usd: 0.0001,
                    is_estimated: false,
                })
            }
        }

        async fn describe_images(
            &self,
            _images: &[ImageInput],
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            unreachable!("not exercised in these tests")
        }
    }

    struct PermanentFailure {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VisionProvider for PermanentFailure {
        fn name(&self) -> &'static str {
            "openai"
        }

        async fn describe_image(
            &self,
            _image: &ImageInput,
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Http {
                provider: "openai".to_string(),
                status: 401,
                body: "bad key".to_string(),
            })
        }

        async fn describe_images(
            &self,
            _images: &[ImageInput],
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            unreachable!("not exercised in these tests")
        }
    }

    fn ctx() -> PromptContext<'static> {
        PromptContext {
            camera_name: "Driveway",
            timestamp_rfc3339: "2026-01-01T00:00:00Z",
            detected_objects: &[],
            custom_prompt: None,
            audio_transcription: None,
            is_doorbell: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_with_first_provider_after_transient_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(FlakyProvider {
            name: "openai",
            fail_times: 1,
            calls: calls.clone(),
        })];
        let image = ImageInput {
            base64_jpeg: "abc".to_string(),
        };
        let outcome = dispatch_single_frame(&providers, &image, &ctx(), SLA_SINGLE_FRAME).await;
        assert_eq!(outcome.provider_used.as_deref(), Some("openai"));
        assert!(outcome.result.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // One logical attempt is recorded per provider, not per retry.
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_second_provider_after_first_exhausts_retries() {
        let providers: Vec<Box<dyn VisionProvider>> = vec![
            Box::new(FlakyProvider {
                name: "openai",
                fail_times: 99,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FlakyProvider {
                name: "anthropic",
                fail_times: 0,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ];
        let image = ImageInput {
            base64_jpeg: "abc".to_string(),
        };
        let outcome = dispatch_single_frame(&providers, &image, &ctx(), SLA_SINGLE_FRAME).await;
        assert_eq!(outcome.provider_used.as_deref(), Some("anthropic"));
        assert_eq!(outcome.failure_trail, vec!["openai:http_error"]);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].success);
        assert!(outcome.attempts[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_http_status_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn VisionProvider>> =
            vec![Box::new(PermanentFailure { calls: calls.clone() })];
        let image = ImageInput {
            base64_jpeg: "abc".to_string(),
        };
        let outcome = dispatch_single_frame(&providers, &image, &ctx(), SLA_SINGLE_FRAME).await;
        assert!(outcome.result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts[0].error.as_deref().map(|e| e.contains("401")), Some(true));
    }

    #[tokio::test]
    async fn empty_provider_list_fails_immediately() {
        let providers: Vec<Box<dyn VisionProvider>> = vec![];
        let image = ImageInput {
            base64_jpeg: "abc".to_string(),
        };
        let outcome = dispatch_single_frame(&providers, &image, &ctx(), SLA_SINGLE_FRAME).await;
        assert!(outcome.result.is_none());
        assert_eq!(outcome.failure_trail, vec!["no_providers_configured"]);
    }

    #[tokio::test]
    async fn exhausted_sla_budget_stamps_the_timeout_provider() {
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(FlakyProvider {
            name: "openai",
            fail_times: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        })];
        let image = ImageInput {
            base64_jpeg: "abc".to_string(),
        };
        let outcome = dispatch_single_frame(&providers, &image, &ctx(), Duration::ZERO).await;
        assert!(outcome.hit_sla_timeout());
        assert_eq!(outcome.provider_used.as_deref(), Some(TIMEOUT_PROVIDER));
        assert!(outcome.result.is_none());
    }

    struct VideoCapable;

    #[async_trait]
    impl VisionProvider for VideoCapable {
        fn name(&self) -> &'static str {
            "gemini"
        }

        fn video_method(&self) -> VideoMethod {
            VideoMethod::NativeUpload
        }

        async fn describe_image(
            &self,
            _image: &ImageInput,
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            unreachable!("not exercised in these tests")
        }

        async fn describe_images(
            &self,
            _images: &[ImageInput],
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            unreachable!("not exercised in these tests")
        }

        async fn describe_video(
            &self,
            _clip_path: &Path,
            _ctx: &PromptContext<'_>,
        ) -> crate::error::Result<VisionResult> {
            Ok(VisionResult {
                description: "A car arrives, parks, and the driver walks away.".to_string(),
                ai_confidence: Some(77),
                input_tokens: 558,
                output_tokens: 60,
                cost_usd: 0.0001,
                is_estimated: true,
            })
        }
    }

    #[test]
    fn find_video_provider_skips_image_only_providers() {
        let providers: Vec<Box<dyn VisionProvider>> = vec![
            Box::new(FlakyProvider {
                name: "anthropic",
                fail_times: 0,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(VideoCapable),
        ];
        let (provider, method) = find_video_provider(&providers).expect("gemini is video-capable");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(method, VideoMethod::NativeUpload);
    }

    #[test]
    fn no_video_capable_provider_yields_none() {
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(FlakyProvider {
            name: "openai-image-only",
            fail_times: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        })];
        assert!(find_video_provider(&providers).is_none());
    }

    #[tokio::test]
    async fn video_native_dispatch_returns_the_provider_result() {
        let outcome = dispatch_video_native(
            &VideoCapable,
            Path::new("/tmp/clip.mp4"),
            &ctx(),
            SLA_VIDEO_NATIVE,
        )
        .await;
        assert_eq!(outcome.provider_used.as_deref(), Some("gemini"));
        assert!(outcome.result.is_some());
        assert_eq!(outcome.attempts.len(), 1);
    }
}
