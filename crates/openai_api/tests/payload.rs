use openai_api::payload::MAX_IMAGE_COUNT;
use openai_api::{
    ApiConfig, ChatCompletionRequest, ChatMessage, CompletionRequest, CreateImageRequest,
    ImageSize, OpenAiClient, Role,
};
use serde_json::{json, Value};

#[test]
fn chat_payload_skips_unset_optional_fields() {
    let request = ChatCompletionRequest::new("gpt-3.5-turbo", vec![ChatMessage::user("hi")]);
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(
        body,
        json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
        })
    );
}

#[test]
fn chat_payload_includes_optional_fields_when_set() {
    let mut request = ChatCompletionRequest::new(
        "gpt-3.5-turbo",
        vec![ChatMessage::system("sys"), ChatMessage::assistant("prev")],
    );
    request.max_tokens = Some(64);
    request.stop = vec!["\n\n".to_owned()];
    request.temperature = Some(0.2);

    let body = serde_json::to_value(&request).expect("serialize payload");
    assert_eq!(body["max_tokens"], json!(64));
    assert_eq!(body["stop"], json!(["\n\n"]));
    assert_eq!(body["temperature"], json!(0.2));
    assert_eq!(body["messages"][1]["role"], Value::String("assistant".to_owned()));
}

#[test]
fn completion_payload_wraps_prompt_in_list() {
    let request = CompletionRequest::new("Once upon");
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(body, json!({"prompt": ["Once upon"], "stream": false}));
}

#[test]
fn image_payload_uses_wire_sizes() {
    let request = CreateImageRequest::new("a fox")
        .with_count(MAX_IMAGE_COUNT)
        .with_size(ImageSize::Small);
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(body, json!({"prompt": "a fox", "n": 10, "size": "256x256"}));
    assert_eq!(
        serde_json::to_value(ImageSize::Medium).expect("size"),
        json!("512x512")
    );
}

#[test]
fn role_round_trips_lowercase() {
    let role: Role = serde_json::from_value(json!("system")).expect("role");
    assert_eq!(role, Role::System);
    assert_eq!(Role::Assistant.to_string(), "assistant");
}

#[test]
fn build_request_targets_endpoint_with_json_body() {
    let client = OpenAiClient::new(
        ApiConfig::new("sk-test").with_base_url("https://api.example.test/v1/"),
    )
    .expect("client");
    let request = ChatCompletionRequest::new("gpt-3.5-turbo", vec![ChatMessage::user("hi")]);

    let http_request = client
        .build_request("/chat/completions", &request, true)
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(
        http_request.url().as_str(),
        "https://api.example.test/v1/chat/completions"
    );
    assert_eq!(
        http_request
            .headers()
            .get("accept")
            .and_then(|value| value.to_str().ok()),
        Some("text/event-stream")
    );
    let body = request_body_json(&http_request);
    assert_eq!(body["messages"][0]["content"], Value::String("hi".to_owned()));
}

fn request_body_json(request: &reqwest::Request) -> Value {
    let body = request
        .body()
        .expect("request should carry JSON body")
        .as_bytes()
        .expect("JSON body should be buffered bytes");
    serde_json::from_slice::<Value>(body).expect("request body should be valid JSON")
}
