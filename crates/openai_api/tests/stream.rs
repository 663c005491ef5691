use futures_util::stream;

use openai_api::stream::consume_stream;
use openai_api::{ApiError, ChatCompletionResponse, CompletionChunk, TextCompletionResponse};

fn body(chunks: &[&'static str]) -> impl futures_util::Stream<Item = Result<&'static [u8], ApiError>> {
    stream::iter(
        chunks
            .iter()
            .copied()
            .map(|chunk| Ok::<_, ApiError>(chunk.as_bytes()))
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn stream_hello_then_done_yields_one_callback() {
    let mut seen = Vec::new();
    consume_stream::<TextCompletionResponse, _, _, _, _>(
        body(&["data: {\"choices\":[{\"text\":\"hello\"}]}\n\ndata: [DONE]\n\n"]),
        1024,
        None,
        |chunk| seen.push(chunk.text().to_owned()),
    )
    .await
    .expect("clean termination");

    assert_eq!(seen, vec!["hello".to_owned()]);
}

#[tokio::test]
async fn stream_stops_at_sentinel_even_if_more_frames_follow() {
    let mut seen = Vec::new();
    consume_stream::<ChatCompletionResponse, _, _, _, _>(
        body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {broken\n\n",
        ]),
        1024,
        None,
        |chunk| seen.push(chunk.text().to_owned()),
    )
    .await
    .expect("frames after the sentinel are never read");

    assert_eq!(seen, vec!["a".to_owned()]);
}

#[tokio::test]
async fn stream_split_frames_deliver_in_order() {
    let mut seen = Vec::new();
    consume_stream::<ChatCompletionResponse, _, _, _, _>(
        body(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assis",
            "tant\",\"content\":\"Hel\"}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\nda",
            "ta: [DONE]\n\n",
        ]),
        1024,
        None,
        |chunk| seen.push((chunk.text().to_owned(), chunk.can_continue())),
    )
    .await
    .expect("clean termination");

    assert_eq!(
        seen,
        vec![("Hel".to_owned(), true), ("lo".to_owned(), false)]
    );
}

#[tokio::test]
async fn stream_malformed_json_aborts_the_call() {
    let mut calls = 0;
    let error = consume_stream::<ChatCompletionResponse, _, _, _, _>(
        body(&[
            "data: {\"choices\":[]}\n\n",
            "data: {not json}\n\n",
            "data: {\"choices\":[]}\n\n",
        ]),
        1024,
        None,
        |_| calls += 1,
    )
    .await
    .expect_err("malformed payload must fail");

    assert!(matches!(error, ApiError::MalformedChunk(_)));
    assert!(error.to_string().starts_with("invalid json stream data"));
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn stream_overflow_is_a_decode_error() {
    let long = format!("data: {}\n\n", "x".repeat(128));
    let leaked: &'static str = Box::leak(long.into_boxed_str());
    let error = consume_stream::<ChatCompletionResponse, _, _, _, _>(
        body(&[leaked]),
        64,
        None,
        |_| {},
    )
    .await
    .expect_err("line exceeds buffer");

    assert!(matches!(error, ApiError::Decode(_)));
}

#[tokio::test]
async fn stream_without_sentinel_ends_cleanly() {
    let mut calls = 0;
    consume_stream::<ChatCompletionResponse, _, _, _, _>(
        body(&["data: {\"choices\":[]}\n\n"]),
        1024,
        None,
        |_| calls += 1,
    )
    .await
    .expect("end of body is a clean end");

    assert_eq!(calls, 1);
}
