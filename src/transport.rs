use std::future::Future;

use openai_api::{
    ApiError, CancellationSignal, ChatCompletionRequest, ChatCompletionResponse,
    CompletionRequest, CreateImageRequest, CreateImageResponse, OpenAiClient,
    TextCompletionResponse,
};

pub type ChatChunkSink<'a> = dyn FnMut(&ChatCompletionResponse) + Send + 'a;
pub type TextChunkSink<'a> = dyn FnMut(&TextCompletionResponse) + Send + 'a;

/// HTTP side of the conversation client.
///
/// Implemented by [`OpenAiClient`]; tests substitute scripted fakes.
pub trait Transport: Send + Sync {
    fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<ChatCompletionResponse, ApiError>> + Send;

    fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: &mut ChatChunkSink<'_>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn completion(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<TextCompletionResponse, ApiError>> + Send;

    fn completion_stream(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: &mut TextChunkSink<'_>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_image(
        &self,
        request: &CreateImageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<CreateImageResponse, ApiError>> + Send;
}

impl Transport for OpenAiClient {
    fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<ChatCompletionResponse, ApiError>> + Send {
        OpenAiClient::chat_completion(self, request, cancellation)
    }

    fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: &mut ChatChunkSink<'_>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        OpenAiClient::chat_completion_stream(self, request, cancellation, on_chunk)
    }

    fn completion(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<TextCompletionResponse, ApiError>> + Send {
        OpenAiClient::completion(self, engine, request, cancellation)
    }

    fn completion_stream(
        &self,
        engine: &str,
        request: &CompletionRequest,
        cancellation: Option<&CancellationSignal>,
        on_chunk: &mut TextChunkSink<'_>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        OpenAiClient::completion_stream(self, engine, request, cancellation, on_chunk)
    }

    fn create_image(
        &self,
        request: &CreateImageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<CreateImageResponse, ApiError>> + Send {
        OpenAiClient::create_image(self, request, cancellation)
    }
}
