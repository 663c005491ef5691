use std::collections::BTreeMap;

use crate::config::ApiConfig;
use crate::error::ApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_AZURE_API_KEY: &str = "api-key";
pub const HEADER_ORGANIZATION: &str = "openai-organization";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for one request.
///
/// `streaming` selects the `accept` value. At least one of the bearer key or
/// the Azure key must be configured.
pub fn build_headers(
    config: &ApiConfig,
    streaming: bool,
) -> Result<BTreeMap<String, String>, ApiError> {
    let api_key = non_empty(&config.api_key);
    let azure_api_key = config.azure_api_key.as_deref().and_then(non_empty);
    if api_key.is_none() && azure_api_key.is_none() {
        return Err(ApiError::MissingApiKey);
    }

    let mut headers = BTreeMap::new();
    if let Some(api_key) = api_key {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {api_key}"));
    }
    if let Some(azure_api_key) = azure_api_key {
        headers.insert(HEADER_AZURE_API_KEY.to_owned(), azure_api_key.to_owned());
    }
    if let Some(organization) = config.organization.as_deref().and_then(non_empty) {
        headers.insert(HEADER_ORGANIZATION.to_owned(), organization.to_owned());
    }

    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );
    headers.insert(
        HEADER_ACCEPT.to_owned(),
        if streaming {
            "text/event-stream"
        } else {
            "application/json"
        }
        .to_owned(),
    );
    if let Some(user_agent) = non_empty(&config.user_agent) {
        headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.to_owned());
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
