//! Per-session aggregation — spec.md section 9's channel-per-session
//! redesign of the coroutine-based streaming handler pattern: the
//! interceptor pushes decoded envelope contributions into a bounded
//! channel, and a single consumer task owns the accumulator, eliminating
//! any shared-mutable state behind closures.

use tokio::sync::mpsc;

use crate::domain::models::RawCitation;

use super::envelope::{decode_envelope, DecodedEnvelope};
use super::parser::drain_events;

/// One contribution pushed by the network-response listener into the
/// session channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    SubQuery(String),
    Citation(RawCitation),
    AnswerChunk(String),
}

/// The accumulated, still-unordered state of one chat session, built by
/// draining a `StreamEvent` channel to completion.
#[derive(Debug, Clone, Default)]
pub struct SessionAccumulator {
    pub sub_queries: Vec<String>,
    pub citations: Vec<RawCitation>,
    pub answer_text: String,
}

impl SessionAccumulator {
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::SubQuery(q) => self.sub_queries.push(q),
            StreamEvent::Citation(c) => self.citations.push(c),
            StreamEvent::AnswerChunk(chunk) => self.answer_text.push_str(&chunk),
        }
    }

    pub fn apply_envelope(&mut self, envelope: DecodedEnvelope) {
        self.sub_queries.extend(envelope.sub_queries);
        self.citations.extend(envelope.citations);
        if let Some(chunk) = envelope.answer_chunk {
            self.answer_text.push_str(&chunk);
        }
    }
}

/// Feeds one raw network-response body (a full SSE body, not a stream)
/// through the frame parser and envelope decoder, pushing every
/// contribution onto `tx`. Returns once the body is fully consumed or the
/// receiver has been dropped.
pub async fn feed_body(body: &str, tx: &mpsc::Sender<StreamEvent>) {
    let mut buffer = body.to_string();
    for payload in drain_events(&mut buffer) {
        let envelope = decode_envelope(&payload);
        for sub_query in envelope.sub_queries {
            if tx.send(StreamEvent::SubQuery(sub_query)).await.is_err() {
                return;
            }
        }
        for citation in envelope.citations {
            if tx.send(StreamEvent::Citation(citation)).await.is_err() {
                return;
            }
        }
        if let Some(chunk) = envelope.answer_chunk {
            if tx.send(StreamEvent::AnswerChunk(chunk)).await.is_err() {
                return;
            }
        }
    }
}

/// Drains `rx` to completion (the sender side is dropped when the
/// browser session / HTTP response ends) and returns the aggregated
/// session state, ready for the Result Normalizer.
pub async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> SessionAccumulator {
    let mut accumulator = SessionAccumulator::default();
    while let Some(event) = rx.recv().await {
        accumulator.apply(event);
    }
    accumulator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feeds_and_collects_multiple_events() {
        let (tx, rx) = mpsc::channel(16);
        let body = concat!(
            "data: {\"content\":\"hel\"}\n\n",
            "data: {\"results\":[{\"url\":\"https://x/1\"}]}\n\n",
            "data: {\"queries\":[\"q1\"]}\n\n",
            "data: [DONE]\n\n",
        );
        feed_body(body, &tx).await;
        drop(tx);
        let accumulator = collect(rx).await;

        assert_eq!(accumulator.answer_text, "hel");
        assert_eq!(accumulator.citations.len(), 1);
        assert_eq!(accumulator.sub_queries, vec!["q1"]);
    }

    #[test]
    fn apply_envelope_accumulates_in_place() {
        let mut accumulator = SessionAccumulator::default();
        accumulator.apply_envelope(DecodedEnvelope {
            sub_queries: vec!["q".to_string()],
            citations: vec![RawCitation::new("https://y/1")],
            answer_chunk: Some("part".to_string()),
        });
        assert_eq!(accumulator.sub_queries, vec!["q"]);
        assert_eq!(accumulator.citations.len(), 1);
        assert_eq!(accumulator.answer_text, "part");
    }
}
