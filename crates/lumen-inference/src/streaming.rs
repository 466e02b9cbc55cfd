//! Line framing for streamed HTTP response bodies.
//!
//! Both Ollama (NDJSON) and OpenAI-compatible servers (SSE) frame their
//! streamed output as newline-terminated lines, but network chunks do not
//! respect line boundaries. [`LineBuffer`] reassembles complete lines and
//! [`lines_stream`] applies it to a `reqwest` byte stream.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use lumen_core::{Error, Result};

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, without the
    /// terminator. Blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = decode_line(&raw[..raw.len() - 1]);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing line that had no terminator.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = decode_line(&rest);
        (!line.is_empty()).then_some(line)
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\r')
        .to_string()
}

struct LineState<S> {
    inner: Pin<Box<S>>,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    exhausted: bool,
}

/// Re-frame a byte stream into a stream of complete lines.
///
/// A transport error is yielded once and ends the stream.
pub fn lines_stream<S>(stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = LineState {
        inner: Box::pin(stream),
        buffer: LineBuffer::default(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.exhausted {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    let lines = state.buffer.push(&bytes);
                    state.ready.extend(lines);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((
                        Err(Error::Inference(format!("Stream error: {}", e))),
                        state,
                    ));
                }
                None => {
                    state.exhausted = true;
                    if let Some(rest) = state.buffer.finish() {
                        state.ready.push_back(rest);
                    }
                }
            }
        }
    })
}
