//! Evidence acquisition and AI fallback chain: walks video_native →
//! multi_frame → single_frame in strict order, recording the exact path
//! taken so a terminal failure is still traceable.

use std::path::Path;
use std::time::Duration;

use nightwatch_core::model::{AnalysisMode as Mode, Camera, DetectionType, SourceKind, VideoMethod};
use nightwatch_frames::{extract_frames, to_base64, ExtractedFrame};
use nightwatch_vision::dispatch::{
    dispatch_multi_frame, dispatch_single_frame, dispatch_video_frames, dispatch_video_native,
    find_video_provider, AttemptRecord, DispatchOutcome, SLA_MULTI_FRAME, SLA_SINGLE_FRAME,
    SLA_VIDEO_NATIVE,
};
use nightwatch_vision::prompt::PromptContext;
use nightwatch_vision::provider::{ImageInput, VisionProvider};

/// Default number of frames requested for a multi-frame analysis.
pub const DEFAULT_FRAME_COUNT: u32 = 5;

/// Budget for a doorbell audio transcription attempt; failures here never
/// block the chain.
pub const AUDIO_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(8);

/// The outcome of running the fallback chain for one event.
#[derive(Debug, Clone)]
pub struct EvidenceOutcome {
    pub description: String,
    pub ai_confidence: Option<u8>,
    pub analysis_mode: Option<Mode>,
    pub frame_count_used: Option<u32>,
    pub fallback_reason: Option<String>,
    pub provider_used: Option<String>,
    pub cost_usd: Option<f64>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Frames that were actually sent for multi-frame analysis, kept so
    /// the caller can persist them as key frames when configured to.
    pub frames_used: Vec<ExtractedFrame>,
    /// Every provider attempt made along the chain, for the usage log.
    pub attempts: Vec<AttemptRecord>,
    /// True when every step in the chain failed and the pipeline must
    /// store the terminal "AI analysis unavailable" sentinel.
    pub terminal_unavailable: bool,
}

fn join_trail(trail: &[String]) -> Option<String> {
    if trail.is_empty() {
        None
    } else {
        Some(trail.join(","))
    }
}

fn video_failure_reason(outcome: &DispatchOutcome) -> &'static str {
    if outcome.hit_sla_timeout() {
        "timeout"
    } else {
        "ai_failed"
    }
}

/// Folds a dispatch outcome into the running chain state: attempt records
/// always accumulate; a success consumes them into the final
/// [`EvidenceOutcome`], a failure leaves them with the caller for the next
/// step.
fn success_outcome(
    outcome: DispatchOutcome,
    mode: Mode,
    frame_count_used: Option<u32>,
    frames_used: Vec<ExtractedFrame>,
    trail: &[String],
    attempts: &mut Vec<AttemptRecord>,
) -> Option<EvidenceOutcome> {
    let DispatchOutcome { result, provider_used, attempts: new_attempts, .. } = outcome;
    attempts.extend(new_attempts);
    let result = result?;
    Some(EvidenceOutcome {
        description: result.description,
        ai_confidence: result.ai_confidence,
        analysis_mode: Some(mode),
        frame_count_used,
        fallback_reason: join_trail(trail),
        provider_used,
        cost_usd: Some(result.cost_usd),
        input_tokens: result.input_tokens,
        output_tokens: result.output_tokens,
        frames_used,
        attempts: std::mem::take(attempts),
        terminal_unavailable: false,
    })
}

/// Runs the evidence-acquisition chain for one qualifying event.
///
/// `snapshot_jpeg` is the still that doubles as the stored thumbnail and
/// the single_frame input (`None` when the snapshot round-trip itself
/// failed); `clip_path` is only `Some` for protect sources that
/// successfully downloaded a clip.
pub async fn acquire_evidence(
    camera: &Camera,
    providers: &[Box<dyn VisionProvider>],
    clip_path: Option<&Path>,
    snapshot_jpeg: Option<&[u8]>,
    ctx: &PromptContext<'_>,
    frame_count: u32,
) -> EvidenceOutcome {
    let mut trail: Vec<String> = Vec::new();
    let mut attempts: Vec<AttemptRecord> = Vec::new();

    if camera.source_kind != SourceKind::Protect {
        match camera.analysis_mode {
            Mode::VideoNative => {
                trail.push("video_native:no_clip_source".to_string());
                trail.push("multi_frame:no_clip_source".to_string());
            }
            Mode::MultiFrame => trail.push("multi_frame:no_clip_source".to_string()),
            Mode::SingleFrame => {}
        }
        return single_frame_step(providers, snapshot_jpeg, ctx, trail, attempts).await;
    }

    // Frames extracted by the video step are reused by the multi-frame
    // step so a fallback doesn't decode the clip twice.
    let mut extracted: Option<Vec<ExtractedFrame>> = None;

    if camera.analysis_mode == Mode::VideoNative {
        match clip_path {
            None => trail.push("video_native:no_clip_available".to_string()),
            Some(path) => match find_video_provider(providers) {
                None => trail.push("video_native:no_video_providers_available".to_string()),
                Some((provider, VideoMethod::NativeUpload)) => {
                    let outcome = dispatch_video_native(provider, path, ctx, SLA_VIDEO_NATIVE).await;
                    let reason = video_failure_reason(&outcome);
                    match success_outcome(outcome, Mode::VideoNative, None, Vec::new(), &trail, &mut attempts) {
                        Some(done) => return done,
                        None => trail.push(format!("video_native:{reason}")),
                    }
                }
                Some((provider, _)) => {
                    match extract_frames(path, frame_count, true).await {
                        Err(_) => trail.push("video_native:frame_extraction_failed".to_string()),
                        Ok(frames) if frames.is_empty() => {
                            trail.push("video_native:frame_extraction_failed".to_string());
                        }
                        Ok(frames) => {
                            let images = to_image_inputs(&frames);
                            let outcome =
                                dispatch_video_frames(provider, &images, ctx, SLA_VIDEO_NATIVE).await;
                            let reason = video_failure_reason(&outcome);
                            extracted = Some(frames);
                            match success_outcome(outcome, Mode::VideoNative, None, Vec::new(), &trail, &mut attempts) {
                                Some(done) => return done,
                                None => trail.push(format!("video_native:{reason}")),
                            }
                        }
                    }
                }
            },
        }
    }

    if matches!(camera.analysis_mode, Mode::VideoNative | Mode::MultiFrame) {
        match clip_path {
            None => {
                trail.push("multi_frame:no_clip_available".to_string());
            }
            Some(path) => {
                let frames = match extracted.take() {
                    Some(frames) => Ok(frames),
                    None => extract_frames(path, frame_count, true).await,
                };
                match frames {
                    Err(_) => trail.push("multi_frame:frame_extraction_failed".to_string()),
                    Ok(frames) if frames.is_empty() => {
                        trail.push("multi_frame:frame_extraction_failed".to_string());
                    }
                    Ok(frames) => {
                        let images = to_image_inputs(&frames);
                        let count = images.len() as u32;
                        let outcome =
                            dispatch_multi_frame(providers, &images, ctx, SLA_MULTI_FRAME).await;
                        match success_outcome(outcome, Mode::MultiFrame, Some(count), frames, &trail, &mut attempts) {
                            Some(done) => return done,
                            None => trail.push("multi_frame:ai_failed".to_string()),
                        }
                    }
                }
            }
        }
    }

    single_frame_step(providers, snapshot_jpeg, ctx, trail, attempts).await
}

fn to_image_inputs(frames: &[ExtractedFrame]) -> Vec<ImageInput> {
    frames
        .iter()
        .map(|f| ImageInput { base64_jpeg: to_base64(&f.jpeg) })
        .collect()
}

fn terminal_unavailable(trail: Vec<String>, attempts: Vec<AttemptRecord>) -> EvidenceOutcome {
    EvidenceOutcome {
        description: nightwatch_core::model::AI_UNAVAILABLE.to_string(),
        ai_confidence: None,
        analysis_mode: None,
        frame_count_used: None,
        fallback_reason: join_trail(&trail),
        provider_used: None,
        cost_usd: None,
        input_tokens: 0,
        output_tokens: 0,
        frames_used: Vec::new(),
        attempts,
        terminal_unavailable: true,
    }
}

async fn single_frame_step(
    providers: &[Box<dyn VisionProvider>],
    snapshot_jpeg: Option<&[u8]>,
    ctx: &PromptContext<'_>,
    mut trail: Vec<String>,
    mut attempts: Vec<AttemptRecord>,
) -> EvidenceOutcome {
    let Some(snapshot_jpeg) = snapshot_jpeg else {
        trail.push("single_frame:no_snapshot".to_string());
        return terminal_unavailable(trail, attempts);
    };

    let image = ImageInput { base64_jpeg: to_base64(snapshot_jpeg) };
    let outcome = dispatch_single_frame(providers, &image, ctx, SLA_SINGLE_FRAME).await;
    match success_outcome(outcome, Mode::SingleFrame, Some(1), Vec::new(), &trail, &mut attempts) {
        Some(done) => done,
        None => {
            trail.push("single_frame:ai_failed".to_string());
            terminal_unavailable(trail, attempts)
        }
    }
}

/// Whether this detection type is a doorbell ring, which publishes a
/// low-latency notification before the chain starts.
#[must_use]
pub fn is_doorbell_ring(detection_type: DetectionType) -> bool {
    detection_type == DetectionType::Ring
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nightwatch_vision::error::{Error as VisionError, Result as VisionResult};
    use nightwatch_vision::provider::VisionResult as ProviderResult;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use uuid::Uuid;

    struct AlwaysFails;
    #[async_trait]
    impl VisionProvider for AlwaysFails {
        fn name(&self) -> &'static str {
            "openai"
        }
        async fn describe_image(&self, _: &ImageInput, _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Err(VisionError::Http { provider: "openai".to_string(), status: 500, body: "down".to_string() })
        }
        async fn describe_images(&self, _: &[ImageInput], _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Err(VisionError::Http { provider: "openai".to_string(), status: 500, body: "down".to_string() })
        }
    }

    struct AlwaysSucceeds;
    #[async_trait]
    impl VisionProvider for AlwaysSucceeds {
        fn name(&self) -> &'static str {
            "openai"
        }
        async fn describe_image(&self, _: &ImageInput, _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Ok(ProviderResult { description: "A car pulls in.".to_string(), ai_confidence: Some(90), input_tokens: 200, output_tokens: 60, cost_usd: 0.001, is_estimated: false })
        }
        async fn describe_images(&self, _: &[ImageInput], _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Ok(ProviderResult { description: "A car pulls in, then parks.".to_string(), ai_confidence: Some(85), input_tokens: 400, output_tokens: 80, cost_usd: 0.002, is_estimated: false })
        }
    }

    struct NativeVideoProvider;
    #[async_trait]
    impl VisionProvider for NativeVideoProvider {
        fn name(&self) -> &'static str {
            "gemini"
        }
        fn video_method(&self) -> VideoMethod {
            VideoMethod::NativeUpload
        }
        async fn describe_image(&self, _: &ImageInput, _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Ok(ProviderResult { description: "A still frame.".to_string(), ai_confidence: Some(70), input_tokens: 558, output_tokens: 40, cost_usd: 0.0001, is_estimated: true })
        }
        async fn describe_images(&self, _: &[ImageInput], _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Ok(ProviderResult { description: "A sequence.".to_string(), ai_confidence: Some(75), input_tokens: 558, output_tokens: 50, cost_usd: 0.0002, is_estimated: true })
        }
        async fn describe_video(&self, _: &Path, _: &PromptContext<'_>) -> VisionResult<ProviderResult> {
            Ok(ProviderResult { description: "A car arrives and the driver walks inside.".to_string(), ai_confidence: Some(80), input_tokens: 900, output_tokens: 70, cost_usd: 0.0003, is_estimated: true })
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

    fn camera(mode: Mode, source_kind: SourceKind) -> Camera {
        Camera {
            id: Uuid::new_v4(),
            name: "Driveway".to_string(),
            source_kind,
            enabled: true,
            detection_filter: HashSet::new(),
            analysis_mode: mode,
            prompt_override: None,
            is_doorbell: false,
            motion_cooldown: Camera::DEFAULT_COOLDOWN,
            protect_id: None,
            mac: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_protect_camera_skips_straight_to_single_frame() {
        let cam = camera(Mode::VideoNative, SourceKind::Rtsp);
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(AlwaysSucceeds)];
        let outcome = acquire_evidence(&cam, &providers, None, Some(b"jpeg"), &ctx(), DEFAULT_FRAME_COUNT).await;
        assert_eq!(outcome.analysis_mode, Some(Mode::SingleFrame));
        assert_eq!(outcome.frame_count_used, Some(1));
        assert_eq!(
            outcome.fallback_reason.as_deref(),
            Some("video_native:no_clip_source,multi_frame:no_clip_source")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn protect_camera_without_clip_falls_through_to_single_frame() {
        let cam = camera(Mode::MultiFrame, SourceKind::Protect);
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(AlwaysSucceeds)];
        let outcome = acquire_evidence(&cam, &providers, None, Some(b"jpeg"), &ctx(), DEFAULT_FRAME_COUNT).await;
        assert_eq!(outcome.analysis_mode, Some(Mode::SingleFrame));
        assert_eq!(outcome.fallback_reason.as_deref(), Some("multi_frame:no_clip_available"));
    }

    #[tokio::test(start_paused = true)]
    async fn video_native_with_no_video_provider_records_the_reason() {
        let cam = camera(Mode::VideoNative, SourceKind::Protect);
        // AlwaysSucceeds has no video method, so the video step is skipped;
        // the bogus clip path then fails frame extraction and the chain
        // lands on single_frame.
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(AlwaysSucceeds)];
        let clip = PathBuf::from("/nonexistent/clip.mp4");
        let outcome =
            acquire_evidence(&cam, &providers, Some(&clip), Some(b"jpeg"), &ctx(), DEFAULT_FRAME_COUNT).await;
        assert_eq!(outcome.analysis_mode, Some(Mode::SingleFrame));
        let reason = outcome.fallback_reason.unwrap();
        assert!(reason.starts_with("video_native:no_video_providers_available"), "got {reason}");
        assert!(reason.contains("multi_frame:"));
    }

    #[tokio::test]
    async fn video_native_success_has_null_frame_count() {
        let cam = camera(Mode::VideoNative, SourceKind::Protect);
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(NativeVideoProvider)];
        let clip = PathBuf::from("/tmp/clip.mp4");
        let outcome =
            acquire_evidence(&cam, &providers, Some(&clip), Some(b"jpeg"), &ctx(), DEFAULT_FRAME_COUNT).await;
        assert_eq!(outcome.analysis_mode, Some(Mode::VideoNative));
        assert_eq!(outcome.frame_count_used, None);
        assert_eq!(outcome.provider_used.as_deref(), Some("gemini"));
        assert_eq!(outcome.fallback_reason, None);
    }

    #[tokio::test(start_paused = true)]
    async fn every_provider_failing_returns_terminal_unavailable() {
        let cam = camera(Mode::SingleFrame, SourceKind::Rtsp);
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(AlwaysFails)];
        let outcome = acquire_evidence(&cam, &providers, None, Some(b"jpeg"), &ctx(), DEFAULT_FRAME_COUNT).await;
        assert!(outcome.terminal_unavailable);
        assert_eq!(outcome.description, nightwatch_core::model::AI_UNAVAILABLE);
        assert_eq!(outcome.provider_used, None);
        assert!(outcome.fallback_reason.unwrap().ends_with("single_frame:ai_failed"));
    }

    #[tokio::test]
    async fn missing_snapshot_is_terminal_with_its_own_reason() {
        let cam = camera(Mode::SingleFrame, SourceKind::Rtsp);
        let providers: Vec<Box<dyn VisionProvider>> = vec![Box::new(AlwaysSucceeds)];
        let outcome = acquire_evidence(&cam, &providers, None, None, &ctx(), DEFAULT_FRAME_COUNT).await;
        assert!(outcome.terminal_unavailable);
        assert_eq!(outcome.fallback_reason.as_deref(), Some("single_frame:no_snapshot"));
    }

    #[test]
    fn ring_detection_type_is_a_doorbell_ring() {
        assert!(is_doorbell_ring(DetectionType::Ring));
        assert!(!is_doorbell_ring(DetectionType::Motion));
    }
}
