use reqwest::StatusCode;

use openai_api::error::{parse_api_error, UNEXPECTED_ERROR_TYPE};
use openai_api::ApiError;

#[test]
fn parse_api_error_reads_structured_body() {
    let body = r#"{"error":{"message":"invalid model","type":"invalid_request_error","code":null}}"#;
    let error = parse_api_error(StatusCode::BAD_REQUEST, body);

    match error {
        ApiError::Api {
            status,
            error_type,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(error_type, "invalid_request_error");
            assert_eq!(message, "invalid model");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn parse_api_error_falls_back_to_raw_body() {
    let error = parse_api_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
    assert!(matches!(
        &error,
        ApiError::Api { status: 502, error_type, message }
            if error_type == UNEXPECTED_ERROR_TYPE && message == "<html>bad gateway</html>"
    ));
}

#[test]
fn parse_api_error_uses_reason_phrase_for_empty_body() {
    let error = parse_api_error(StatusCode::TOO_MANY_REQUESTS, "");
    assert_eq!(error.to_string(), "HTTP 429 Unexpected: Too Many Requests");
}
