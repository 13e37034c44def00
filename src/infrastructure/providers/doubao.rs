//! Doubao `ChatDriver` — grounded on
//! `original_source/geo_server/providers/doubao_web.py`: the
//! `www.doubao.com` chat UI, whose streamed response uses a
//! `patch_op`/`content_block`/`block_type` envelope (`10000` for answer
//! text, `10025` for search-result blocks) already handled by
//! [`crate::infrastructure::sse::envelope`]'s patch-op decoder, plus a DOM
//! fallback that must exclude Doubao's own family of domains from the
//! harvested citation set.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::errors::ProviderError;
use crate::infrastructure::browser::BrowserSession;

use super::hosted_chat::ChatDriver;

pub struct DoubaoChatDriver;

const OWN_DOMAINS: &[&str] = &["doubao.com", "bytecheck.com", "volcengine.com", "bytedance.com"];

#[async_trait]
impl ChatDriver for DoubaoChatDriver {
    fn platform_name(&self) -> &'static str {
        "doubao"
    }

    fn chat_url(&self) -> &'static str {
        "https://www.doubao.com/"
    }

    fn profile_subdir(&self) -> &'static str {
        "doubao"
    }

    fn input_selector(&self) -> &'static str {
        "textarea[data-testid='chat_input_input']"
    }

    fn content_selector(&self) -> &'static str {
        "[data-testid='receive_message']"
    }

    fn stop_selector(&self) -> &'static str {
        "[data-testid='chat_input_stop_button']"
    }

    fn own_domains(&self) -> &'static [&'static str] {
        OWN_DOMAINS
    }

    fn is_chat_endpoint(&self, url: &str) -> bool {
        url.contains("/samantha/chat/completion")
    }

    /// Doubao's web-search toggle is a persistent account-level setting in
    /// the original rather than a per-message affordance; there is nothing
    /// to click here, mirroring `doubao_web.py`'s no-op toggle step.
    async fn ensure_web_search_enabled(
        &self,
        _session: &BrowserSession,
        _deadline: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn submit(
        &self,
        session: &BrowserSession,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let send_selector = "[data-testid='chat_input_send_button']";
        if session.click(send_selector, deadline, cancel).await.is_err() {
            warn!("doubao send button not found, falling back to Enter key submit");
            return Err(ProviderError::Provider(
                "doubao send button not found".to_string(),
            ));
        }
        Ok(())
    }
}
