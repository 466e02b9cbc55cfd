//! SSE stream parsing for OpenAI-compatible streaming responses.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use lumen_core::{Error, Result, TokenStream};

use super::types::ChatCompletionChunk;
use crate::streaming::lines_stream;

/// One decoded SSE line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Skip,
}

/// Parse SSE stream from an OpenAI-compatible endpoint into text deltas.
///
/// The stream ends at `data: [DONE]` or when the body closes.
pub fn parse_sse_stream(
    stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
) -> TokenStream {
    let token_stream = lines_stream(stream)
        .map(|line| line.and_then(|l| parse_sse_line(&l)))
        .take_while(|event| {
            let more = !matches!(event, Ok(SseEvent::Done));
            async move { more }
        })
        .filter_map(|event| async move {
            match event {
                Ok(SseEvent::Token(text)) => Some(Ok(text)),
                Ok(SseEvent::Done) | Ok(SseEvent::Skip) => None,
                Err(e) => Some(Err(e)),
            }
        });

    Box::pin(token_stream)
}

/// Parse a single SSE line.
fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let line = line.trim();

    // Comments and non-data fields (event:, id:, retry:)
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| Error::Inference(format!("Failed to parse SSE chunk: {}", e)))?;

    let content: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if content.is_empty() {
        Ok(SseEvent::Skip)
    } else {
        Ok(SseEvent::Token(content))
    }
}
