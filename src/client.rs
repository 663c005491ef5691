use openai_api::payload::MAX_IMAGE_COUNT;
use openai_api::{
    ApiConfig, CancellationSignal, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    CompletionChunk, CompletionRequest, CreateImageRequest, CreateImageResponse, OpenAiClient,
    Role, TextCompletionResponse,
};

use crate::config::ClientOptions;
use crate::error::Error;
use crate::transport::Transport;

/// Result of a one-shot call; chat or text depending on the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutput {
    Chat(ChatCompletionResponse),
    Text(TextCompletionResponse),
}

impl CompletionOutput {
    fn inner(&self) -> &dyn CompletionChunk {
        match self {
            Self::Chat(response) => response,
            Self::Text(response) => response,
        }
    }
}

impl CompletionChunk for CompletionOutput {
    fn text(&self) -> &str {
        self.inner().text()
    }

    fn role(&self) -> Option<Role> {
        self.inner().role()
    }

    fn can_continue(&self) -> bool {
        self.inner().can_continue()
    }

    fn total_tokens(&self) -> u64 {
        self.inner().total_tokens()
    }

    fn reset(&mut self) {
        match self {
            Self::Chat(response) => response.reset(),
            Self::Text(response) => response.reset(),
        }
    }
}

/// Conversation client: budgets turns, picks the endpoint for the configured
/// engine and hands the request to the transport.
///
/// Holds no per-call state, so one client can serve concurrent calls.
#[derive(Debug)]
pub struct GptClient<T = OpenAiClient> {
    transport: T,
    options: ClientOptions,
}

impl GptClient<OpenAiClient> {
    pub fn from_config(config: ApiConfig, options: ClientOptions) -> Result<Self, Error> {
        Ok(Self::new(OpenAiClient::new(config)?, options))
    }
}

impl<T: Transport> GptClient<T> {
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stream a reply to `turns`, calling `on_chunk` once per decoded chunk.
    ///
    /// Returns once the stream terminates. Nothing is sent if `turns` is
    /// empty or does not fit the context budget.
    pub async fn do_stream<F>(
        &self,
        turns: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
        mut on_chunk: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&dyn CompletionChunk) + Send,
    {
        let messages = self.budgeted(turns)?;
        let engine = self.options.engine.as_str();

        if self.options.engine.is_chat() {
            let request = self.chat_request(messages);
            let mut forward = |chunk: &ChatCompletionResponse| on_chunk(chunk);
            self.transport
                .chat_completion_stream(&request, cancellation, &mut forward)
                .await?;
        } else {
            let request = self.completion_request(&messages);
            let mut forward = |chunk: &TextCompletionResponse| on_chunk(chunk);
            self.transport
                .completion_stream(engine, &request, cancellation, &mut forward)
                .await?;
        }

        tracing::debug!(engine, "stream finished");
        Ok(())
    }

    /// One-shot counterpart of [`GptClient::do_stream`].
    pub async fn do_once(
        &self,
        turns: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<CompletionOutput, Error> {
        let messages = self.budgeted(turns)?;

        if self.options.engine.is_chat() {
            let request = self.chat_request(messages);
            let response = self.transport.chat_completion(&request, cancellation).await?;
            Ok(CompletionOutput::Chat(response))
        } else {
            let request = self.completion_request(&messages);
            let response = self
                .transport
                .completion(self.options.engine.as_str(), &request, cancellation)
                .await?;
            Ok(CompletionOutput::Text(response))
        }
    }

    /// Generate images. `n == 0` asks for one image.
    pub async fn create_image(
        &self,
        mut request: CreateImageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<CreateImageResponse, Error> {
        if request.prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        if request.n > MAX_IMAGE_COUNT {
            return Err(Error::TooManyImages {
                requested: request.n,
                max: MAX_IMAGE_COUNT,
            });
        }
        if request.n == 0 {
            request.n = 1;
        }

        Ok(self.transport.create_image(&request, cancellation).await?)
    }

    fn budgeted(&self, turns: &[ChatMessage]) -> Result<Vec<ChatMessage>, Error> {
        if turns.is_empty() {
            return Err(Error::EmptyConversation);
        }
        Ok(self.options.budget().fit(&self.options.system_prompt, turns)?)
    }

    fn chat_request(&self, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        let mut request = ChatCompletionRequest::new(self.options.engine.as_str(), messages);
        request.max_tokens = Some(self.options.max_tokens);
        request.stop = self.options.stop.clone();
        request.temperature = self.options.temperature;
        request
    }

    /// Text engines take a single prompt: the system text followed by every
    /// retained turn's content.
    fn completion_request(&self, messages: &[ChatMessage]) -> CompletionRequest {
        let mut system = "";
        let mut text = String::new();
        for message in messages {
            if message.role == Role::System {
                system = message.content.as_str();
            } else {
                text.push_str(&message.content);
            }
        }

        let mut request = CompletionRequest::new(format!("{system}{text}"));
        request.max_tokens = Some(self.options.max_tokens);
        request.stop = self.options.stop.clone();
        request.temperature = self.options.temperature;
        request
    }
}
