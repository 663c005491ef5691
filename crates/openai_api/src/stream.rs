//! Projection of decoded event-stream frames onto typed response chunks.

use std::pin::pin;

use futures_util::Stream;
use serde::de::DeserializeOwned;

use crate::cancel::{await_or_cancel, CancellationSignal};
use crate::error::ApiError;
use crate::response::CompletionChunk;
use crate::sse::{DecodedFrame, EventStreamReader};

/// Outcome of projecting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// A chunk was parsed and handed to the callback.
    Delivered,
    /// The frame was the terminal sentinel; nothing follows.
    Done,
}

/// Reset `accumulator`, parse `frame` into it and hand it to `on_chunk`.
///
/// The sentinel is checked before any parsing and never reaches the callback.
/// A payload that is not valid JSON for `R` fails the whole stream, leaving
/// the accumulator cleared.
pub fn project_frame<R, F>(
    frame: &DecodedFrame,
    accumulator: &mut R,
    on_chunk: &mut F,
) -> Result<Projection, ApiError>
where
    R: CompletionChunk + DeserializeOwned,
    F: FnMut(&R),
{
    if frame.is_done() {
        return Ok(Projection::Done);
    }

    accumulator.reset();
    *accumulator = serde_json::from_slice(&frame.data).map_err(ApiError::MalformedChunk)?;
    on_chunk(accumulator);
    Ok(Projection::Delivered)
}

/// Decode `body` to completion, delivering one callback per chunk.
///
/// Returns once the sentinel is seen or the body ends. Each call owns its own
/// decoder and accumulator.
pub async fn consume_stream<R, S, B, E, F>(
    body: S,
    max_buffer_size: usize,
    cancellation: Option<&CancellationSignal>,
    mut on_chunk: F,
) -> Result<(), ApiError>
where
    R: CompletionChunk + DeserializeOwned + Default,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ApiError>,
    F: FnMut(&R),
{
    let body = pin!(body);
    let mut reader = EventStreamReader::new(body, max_buffer_size);
    let mut accumulator = R::default();
    let mut delivered = 0usize;

    while let Some(event) = await_or_cancel(reader.read_event(), cancellation).await?? {
        let frame = DecodedFrame::from(event);
        match project_frame(&frame, &mut accumulator, &mut on_chunk)? {
            Projection::Delivered => delivered += 1,
            Projection::Done => {
                tracing::debug!(delivered, "event stream reached terminal sentinel");
                return Ok(());
            }
        }
    }

    tracing::debug!(delivered, "event stream ended without terminal sentinel");
    Ok(())
}
