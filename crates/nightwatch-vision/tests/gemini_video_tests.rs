//! Integration tests for the Gemini native video upload path against a mock
//! HTTP server: upload, processing-state probe, then inference by file URI.

use nightwatch_vision::provider::VisionProvider;
use nightwatch_vision::providers::GeminiProvider;
use nightwatch_vision::prompt::PromptContext;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ctx() -> PromptContext<'static> {
    PromptContext {
        camera_name: "Front",
        timestamp_rfc3339: "2026-01-01T08:00:00Z",
        detected_objects: &[],
        custom_prompt: None,
        audio_transcription: None,
        is_doorbell: false,
    }
}

fn generate_response(content: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": content}]},
            "finishReason": "STOP",
        }],
        "usageMetadata": {
            "promptTokenCount": 558,
            "candidatesTokenCount": 61,
        }
    })
}

#[tokio::test]
async fn describe_video_uploads_and_infers_on_an_active_file() {
    let server = MockServer::start().await;
    let clip = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(clip.path(), b"not-really-mp4").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/abc123",
                "uri": format!("{}/v1beta/files/abc123", server.uri()),
                "state": "ACTIVE",
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response(
            r#"{"description": "A van pulls in, the driver drops a package and leaves.", "confidence": 79}"#,
        )))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key".to_string()).with_base_url(server.uri());
    let result = provider.describe_video(clip.path(), &ctx()).await.unwrap();

    assert_eq!(
        result.description,
        "A van pulls in, the driver drops a package and leaves."
    );
    assert_eq!(result.ai_confidence, Some(79));
    assert_eq!(result.input_tokens, 558);
    assert_eq!(result.output_tokens, 61);
    assert!(!result.is_estimated);
}

#[tokio::test]
async fn describe_video_polls_processing_file_until_active() {
    let server = MockServer::start().await;
    let clip = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(clip.path(), b"not-really-mp4").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/slow",
                "uri": format!("{}/v1beta/files/slow", server.uri()),
                "state": "PROCESSING",
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "files/slow",
            "uri": format!("{}/v1beta/files/slow", server.uri()),
            "state": "ACTIVE",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response(
            r#"{"description": "A cat crosses the yard.", "confidence": 66}"#,
        )))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key".to_string()).with_base_url(server.uri());
    let result = provider.describe_video(clip.path(), &ctx()).await.unwrap();
    assert_eq!(result.description, "A cat crosses the yard.");
}

#[tokio::test]
async fn describe_video_fails_when_server_side_processing_fails() {
    let server = MockServer::start().await;
    let clip = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(clip.path(), b"not-really-mp4").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/bad",
                "uri": format!("{}/v1beta/files/bad", server.uri()),
                "state": "FAILED",
            }
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key".to_string()).with_base_url(server.uri());
    let err = provider.describe_video(clip.path(), &ctx()).await.unwrap_err();
    match err {
        nightwatch_vision::Error::VideoProcessing { provider, .. } => assert_eq!(provider, "gemini"),
        other => panic!("expected VideoProcessing error, got {other:?}"),
    }
}
