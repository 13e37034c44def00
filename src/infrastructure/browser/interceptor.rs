//! Network-response interception — spec.md section 4.2/4.3.
//!
//! During a hosted-chat session, every HTTP response observed on a URL
//! matching the platform's chat/completion endpoint is inspected; those
//! whose content-type indicates a server-sent-event stream have their
//! body fed through the SSE frame parser and envelope decoder into the
//! session's event channel.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;
use crate::infrastructure::sse::{feed_body, StreamEvent};

use super::session::BrowserSession;

/// Listens to `Network.responseReceived` for one session and feeds
/// matching response bodies into `tx`.
pub struct StreamInterceptor<'a> {
    session: &'a BrowserSession,
}

impl<'a> StreamInterceptor<'a> {
    #[must_use]
    pub fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Runs until `cancel` fires or the browser closes the event stream.
    /// `is_chat_endpoint` is the provider-specific URL discriminator
    /// (e.g. "contains /chat/completion").
    pub async fn run(
        &self,
        is_chat_endpoint: impl Fn(&str) -> bool,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        let mut events = self.session.response_events().await?;

        loop {
            tokio::select! {
                event = events.next() => {
                    let Some(event) = event else { break };
                    let response = &event.response;

                    if !is_chat_endpoint(&response.url) {
                        continue;
                    }
                    if !response.mime_type.contains("event-stream") {
                        continue;
                    }

                    if let Ok(body) = self.session.response_body(event.request_id.clone()).await {
                        feed_body(&body, &tx).await;
                    }
                }
                () = cancel.cancelled() => break,
            }
        }

        Ok(())
    }
}
