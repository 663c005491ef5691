use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use gpt_client::logging::init_tracing;
use gpt_client::openai_api::{
    ApiConfig, CancellationSignal, ChatMessage, CompletionChunk, CreateImageRequest,
};
use gpt_client::{ClientOptions, Engine, Error, GptClient};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] Error),

    #[error("writing reply: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Client(error) if error.is_cancelled())
    }
}

/// Streams reply text to `out`, stopping the request on the first write error.
struct ChunkWriter<W> {
    out: W,
    cancellation: CancellationSignal,
    error: Option<io::Error>,
}

impl<W: Write> ChunkWriter<W> {
    fn new(out: W, cancellation: CancellationSignal) -> Self {
        Self {
            out,
            cancellation,
            error: None,
        }
    }

    fn write_chunk(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(error) = result {
            tracing::debug!(%error, "reply output failed; cancelling stream");
            self.error = Some(error);
            self.cancellation.store(true, Ordering::Release);
        }
    }

    fn finish(self) -> io::Result<()> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Send one prompt and print the reply as it streams in.
#[derive(Debug, Parser)]
#[command(name = "gpt-chat", version)]
struct Cli {
    /// API key; falls back to OPENAI_API_KEY.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "OPENAI_ORGANIZATION")]
    org: Option<String>,

    #[arg(short, long)]
    model: Option<String>,

    /// System prompt placed before the conversation.
    #[arg(short, long)]
    system: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Wait for the whole reply instead of streaming it.
    #[arg(long)]
    once: bool,

    /// Generate N images for the prompt and print their URLs.
    #[arg(long, value_name = "N")]
    image: Option<u32>,

    #[arg(required = true)]
    prompt: Vec<String>,
}

impl Cli {
    fn api_config(&self) -> ApiConfig {
        let mut config = ApiConfig::from_env();
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(org) = &self.org {
            config = config.with_organization(org);
        }
        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retry(max_retries);
        }
        config
    }

    fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::from_env();
        if let Some(model) = &self.model {
            options = options.with_engine(Engine::from(model.as_str()));
        }
        if let Some(system) = &self.system {
            options = options.with_system_prompt(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_cancelled() => ExitCode::from(130),
        Err(error) => {
            eprintln!("gpt-chat: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = GptClient::from_config(cli.api_config(), cli.client_options())?;
    let prompt = cli.prompt.join(" ");

    let cancellation = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let cancellation = Arc::clone(&cancellation);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.store(true, Ordering::Release);
            }
        }
    });

    if let Some(count) = cli.image {
        let request = CreateImageRequest::new(prompt).with_count(count);
        let response = client.create_image(request, Some(&cancellation)).await?;
        for image in response.data {
            println!("{}", image.url);
        }
        return Ok(());
    }

    let turns = [ChatMessage::user(prompt)];
    if cli.once {
        let response = client.do_once(&turns, Some(&cancellation)).await?;
        println!("{}", response.text());
        return Ok(());
    }

    let mut writer = ChunkWriter::new(io::stdout(), Arc::clone(&cancellation));
    let streamed = client
        .do_stream(&turns, Some(&cancellation), |chunk| {
            writer.write_chunk(chunk.text())
        })
        .await;
    // A failed write cancels the stream, so report the write error first.
    writer.finish()?;
    streamed?;
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use gpt_client::openai_api::ApiError;

    use super::*;

    struct BrokenPipe {
        writes: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn chunk_writer_passes_text_through() {
        let cancellation = Arc::new(AtomicBool::new(false));
        let mut writer = ChunkWriter::new(Vec::new(), Arc::clone(&cancellation));
        writer.write_chunk("Hel");
        writer.write_chunk("lo");

        assert!(!cancellation.load(Ordering::Acquire));
        assert_eq!(writer.out, b"Hello");
        assert!(writer.finish().is_ok());
    }

    #[test]
    fn chunk_writer_cancels_on_first_write_error() {
        let cancellation = Arc::new(AtomicBool::new(false));
        let mut writer = ChunkWriter::new(BrokenPipe { writes: 0 }, Arc::clone(&cancellation));
        writer.write_chunk("first");
        writer.write_chunk("second");

        assert!(cancellation.load(Ordering::Acquire));
        assert_eq!(writer.out.writes, 1);
        let error = writer.finish().unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn only_user_cancellation_maps_to_interrupt_exit() {
        let interrupted = CliError::from(Error::from(ApiError::Cancelled));
        assert!(interrupted.is_cancelled());

        let broken = CliError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!broken.is_cancelled());
        assert!(!CliError::from(Error::EmptyPrompt).is_cancelled());
    }
}
