use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cancel::{await_or_cancel, is_cancelled, CancellationSignal};
use crate::config::ApiConfig;
use crate::error::{parse_api_error, ApiError};
use crate::headers::build_headers;
use crate::payload::{
    ChatCompletionRequest, CompletionRequest, CreateImageRequest, CreateImageResponse,
};
use crate::response::{ChatCompletionResponse, TextCompletionResponse};
use crate::retry::execute_when;
use crate::stream::consume_stream;
use crate::url::endpoint_url;

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const IMAGE_GENERATIONS_PATH: &str = "/images/generations";

pub fn engine_completions_path(engine: &str) -> String {
    format!("/engines/{engine}/completions")
}

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    config: ApiConfig,
}

impl OpenAiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.config.base_url, path, self.config.query.as_deref())
    }

    pub fn build_headers(&self, streaming: bool) -> Result<HeaderMap, ApiError> {
        let headers = build_headers(&self.config, streaming)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ApiError::InvalidHeader(format!("key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| ApiError::InvalidHeader(format!("value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request<P>(
        &self,
        path: &str,
        payload: &P,
        streaming: bool,
    ) -> Result<RequestBuilder, ApiError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(ApiError::Encode)?;
        Ok(self
            .http
            .post(self.endpoint(path))
            .headers(self.build_headers(streaming)?)
            .body(body))
    }

    /// POST `payload` and return the first successful response.
    ///
    /// Transient failures are retried per the configured policy; the last
    /// error is returned unchanged once attempts run out.
    pub async fn send_with_retry<P>(
        &self,
        path: &str,
        payload: &P,
        streaming: bool,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ApiError>
    where
        P: Serialize + ?Sized,
    {
        if is_cancelled(cancellation) {
            return Err(ApiError::Cancelled);
        }

        let attempt = move || async move {
            tracing::debug!(path, streaming, "sending request");
            let response = self.build_request(path, payload, streaming)?.send().await?;
            check_for_success(response).await
        };

        await_or_cancel(
            execute_when(&self.config.retry, attempt, ApiError::is_retryable),
            cancellation,
        )
        .await?
    }

    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatCompletionResponse, ApiError> {
        let mut request = request.clone();
        request.stream = false;
        let response = self
            .send_with_retry(CHAT_COMPLETIONS_PATH, &request, false, cancellation)
            .await?;
        read_json(response, cancellation).await
    }

    pub async fn chat_completion_stream<F>(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: F,
    ) -> Result<(), ApiError>
    where
        F: FnMut(&ChatCompletionResponse),
    {
        let mut request = request.clone();
        request.stream = true;
        let response = self
            .send_with_retry(CHAT_COMPLETIONS_PATH, &request, true, cancellation)
            .await?;
        consume_stream::<ChatCompletionResponse, _, _, _, _>(
            response.bytes_stream(),
            self.config.max_buffer_size,
            cancellation,
            on_chunk,
        )
        .await
    }

    pub async fn completion(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<TextCompletionResponse, ApiError> {
        let mut request = request.clone();
        request.stream = false;
        let response = self
            .send_with_retry(&engine_completions_path(engine), &request, false, cancellation)
            .await?;
        read_json(response, cancellation).await
    }

    pub async fn completion_stream<F>(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: F,
    ) -> Result<(), ApiError>
    where
        F: FnMut(&TextCompletionResponse),
    {
        let mut request = request.clone();
        request.stream = true;
        let response = self
            .send_with_retry(&engine_completions_path(engine), &request, true, cancellation)
            .await?;
        consume_stream::<TextCompletionResponse, _, _, _, _>(
            response.bytes_stream(),
            self.config.max_buffer_size,
            cancellation,
            on_chunk,
        )
        .await
    }

    pub async fn create_image(
        &self,
        request: &CreateImageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<CreateImageResponse, ApiError> {
        let response = self
            .send_with_retry(IMAGE_GENERATIONS_PATH, request, false, cancellation)
            .await?;
        read_json(response, cancellation).await
    }
}

async fn check_for_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = parse_api_error(status, &body);
    tracing::debug!(status = status.as_u16(), %error, "request failed");
    Err(error)
}

async fn read_json<T>(
    response: Response,
    cancellation: Option<&CancellationSignal>,
) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let body = await_or_cancel(response.bytes(), cancellation).await??;
    serde_json::from_slice(&body).map_err(ApiError::InvalidResponse)
}

#[cfg(test)]
mod tests {
    use super::{engine_completions_path, OpenAiClient};
    use crate::config::ApiConfig;

    #[test]
    fn endpoint_carries_query() {
        let client = OpenAiClient::new(
            ApiConfig::new("key")
                .with_base_url("https://example.test/v1/")
                .with_query("api-version=1"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(&engine_completions_path("davinci")),
            "https://example.test/v1/engines/davinci/completions?api-version=1"
        );
    }

    #[test]
    fn headers_require_a_key() {
        let client = OpenAiClient::new(ApiConfig::default()).unwrap();
        assert!(client.build_headers(false).is_err());
    }
}
