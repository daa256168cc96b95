//! Integration tests for the OpenAI-compatible provider against a mock HTTP
//! server. No real API key or network access required.

use nightwatch_vision::provider::{ImageInput, VisionProvider};
use nightwatch_vision::providers::OpenAiCompatibleProvider;
use nightwatch_vision::prompt::PromptContext;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_chat_completion_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": 85,
            "completion_tokens": 42,
            "total_tokens": 127,
        }
    })
}

fn ctx() -> PromptContext<'static> {
    PromptContext {
        camera_name: "Backyard",
        timestamp_rfc3339: "2026-01-01T08:00:00Z",
        detected_objects: &[],
        custom_prompt: None,
        audio_transcription: None,
        is_doorbell: false,
    }
}

#[tokio::test]
async fn describe_image_parses_confidence_json_from_mock_response() {
    let server = MockServer::start().await;
    let body = mock_chat_completion_response(
        r#"{"description": "A dog walks across the yard.", "confidence": 88}"#,
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let provider = OpenAiCompatibleProvider::openai("test-key".to_string())
        .with_base_url(format!("{}/chat/completions", server.uri()));

    let image = ImageInput {
        base64_jpeg: "dGVzdA==".to_string(),
    };
    let result = provider.describe_image(&image, &ctx()).await.unwrap();

    assert_eq!(result.description, "A dog walks across the yard.");
    assert_eq!(result.ai_confidence, Some(88));
    assert_eq!(result.input_tokens, 85);
    assert_eq!(result.output_tokens, 42);
    assert!(result.cost_usd > 0.0);
}

#[tokio::test]
async fn describe_image_surfaces_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let provider = OpenAiCompatibleProvider::openai("test-key".to_string())
        .with_base_url(format!("{}/chat/completions", server.uri()));

    let image = ImageInput {
        base64_jpeg: "dGVzdA==".to_string(),
    };
    let err = provider.describe_image(&image, &ctx()).await.unwrap_err();
    match err {
        nightwatch_vision::Error::Http { status, .. } => assert_eq!(status, 429),
        other => panic!("expected Http error, got {other:?}"),
    }
}
