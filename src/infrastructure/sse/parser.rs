//! SSE framing — spec.md section 4.3.
//!
//! Event delimiting and `data:` line joining, adapted from the Claude SSE
//! parser's buffer-draining approach to the platform-agnostic rules this
//! engine needs: multiple `data:` lines per event are joined with a
//! newline, `event:`/`id:`/`retry:` lines are discarded, and a payload of
//! `[DONE]` or `null` terminates the event silently rather than producing
//! an empty JSON value.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Drains complete blank-line-delimited events out of `buffer`, returning
/// each event's joined `data:` payload. Terminal payloads (`[DONE]`,
/// `null`) are filtered out here so callers never see them. Leaves any
/// trailing partial event in `buffer` for the next call.
pub fn drain_events(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(event_end) = buffer.find("\n\n") {
        let event_text = buffer[..event_end].to_string();
        buffer.drain(..event_end + 2);
        if let Some(payload) = join_data_lines(&event_text) {
            if !is_terminal_payload(&payload) {
                payloads.push(payload);
            }
        }
    }
    payloads
}

/// Joins every `data:` line of a single event block with `\n`, discarding
/// `event:`/`id:`/`retry:` lines and comment lines starting with `:`.
fn join_data_lines(event_text: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in event_text.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            continue;
        }
        if trimmed.starts_with("event:") || trimmed.starts_with("id:") || trimmed.starts_with("retry:") {
            continue;
        }
        if let Some(value) = trimmed.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// A `data:` payload that terminates or no-ops the event instead of
/// carrying a JSON envelope.
#[must_use]
pub fn is_terminal_payload(payload: &str) -> bool {
    let trimmed = payload.trim();
    trimmed == "[DONE]" || trimmed == "null"
}

/// Wraps a raw byte stream (e.g. `reqwest::Response::bytes_stream()`) and
/// yields each event's joined `data:` payload as a `String`. Generalizes
/// the buffer-draining `Stream` impl used for single-shape SSE APIs to the
/// multi-envelope-shape protocol this engine has to recover structure
/// from; shape dispatch itself lives in `envelope`.
pub struct SsePayloadStream<E> {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

impl<E> SsePayloadStream<E> {
    pub fn new(byte_stream: impl Stream<Item = Result<Bytes, E>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<E> Stream for SsePayloadStream<E> {
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(payload)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    self.buffer.push_str(&text);
                    let drained = drain_events(&mut self.buffer);
                    if drained.is_empty() {
                        continue;
                    }
                    self.pending.extend(drained);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    self.done = true;
                    if let Some(payload) = join_data_lines(&self.buffer.clone()) {
                        self.buffer.clear();
                        if !is_terminal_payload(&payload) {
                            return Poll::Ready(Some(Ok(payload)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_multiple_data_lines() {
        let mut buffer = String::from("data: {\"a\":1}\ndata: {\"b\":2}\n\n");
        let events = drain_events(&mut buffer);
        assert_eq!(events, vec!["{\"a\":1}\n{\"b\":2}"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn discards_event_id_retry_lines() {
        let mut buffer = String::from("event: update\nid: 7\nretry: 1000\ndata: {\"x\":1}\n\n");
        let events = drain_events(&mut buffer);
        assert_eq!(events, vec!["{\"x\":1}"]);
    }

    #[test]
    fn filters_terminal_payloads() {
        let mut buffer = String::from("data: [DONE]\n\ndata: null\n\ndata: {\"ok\":true}\n\n");
        let events = drain_events(&mut buffer);
        assert_eq!(events, vec!["{\"ok\":true}"]);
    }

    #[test]
    fn leaves_incomplete_event_buffered() {
        let mut buffer = String::from("data: {\"a\":1}\n\ndata: {\"b\":2}");
        let events = drain_events(&mut buffer);
        assert_eq!(events, vec!["{\"a\":1}"]);
        assert_eq!(buffer, "data: {\"b\":2}");
    }
}
