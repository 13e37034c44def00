//! Cancellable browser session wrapper — spec.md section 9's
//! context-threaded deadline pattern: every suspension point takes a
//! deadline derived from `settings.timeout` and races against the unit's
//! cancellation token, so a parent cancellation abandons the session
//! within a bounded time instead of hanging indefinitely.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, GetResponseBodyParams, RequestId};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;

/// One automated browser session bound to a single per-platform profile
/// directory. Concurrency across tasks targeting the same platform is the
/// caller's responsibility (spec.md section 5's named-mutex registry) —
/// this type does not serialize access itself.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
}

impl BrowserSession {
    pub async fn launch(profile_dir: &Path, headless: bool) -> Result<Self, ProviderError> {
        let mut builder = BrowserConfig::builder().user_data_dir(profile_dir);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ProviderError::Provider(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProviderError::Provider(format!("browser launch: {e}")))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProviderError::Provider(format!("new page: {e}")))?;

        Ok(Self { browser, page })
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn navigate(
        &self,
        url: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        run_cancellable(self.page.goto(url), deadline, cancel)
            .await?
            .map_err(|e| ProviderError::Provider(format!("navigate: {e}")))?;
        Ok(())
    }

    pub async fn type_into(
        &self,
        selector: &str,
        text: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let element = run_cancellable(self.page.find_element(selector), deadline, cancel)
            .await?
            .map_err(|e| ProviderError::Provider(format!("selector {selector} not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| ProviderError::Provider(format!("click: {e}")))?;
        element
            .type_str(text)
            .await
            .map_err(|e| ProviderError::Provider(format!("type: {e}")))?;
        Ok(())
    }

    pub async fn click(
        &self,
        selector: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let element = run_cancellable(self.page.find_element(selector), deadline, cancel)
            .await?
            .map_err(|e| ProviderError::Provider(format!("selector {selector} not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| ProviderError::Provider(format!("click: {e}")))?;
        Ok(())
    }

    /// Best-effort read of an element's visible text; `None` if the
    /// selector isn't present yet rather than an error, since this is
    /// polled repeatedly while the page is still rendering.
    pub async fn text_content(&self, selector: &str) -> Option<String> {
        let element = self.page.find_element(selector).await.ok()?;
        element.inner_text().await.ok().flatten()
    }

    /// Polls `content_selector`'s text until it is unchanged across two
    /// consecutive samples AND `stop_selector` (the "stop generation"
    /// affordance) is absent — the generation-stability check from
    /// spec.md section 4.2.
    pub async fn wait_for_stable_content(
        &self,
        content_selector: &str,
        stop_selector: &str,
        poll_interval: Duration,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let started = tokio::time::Instant::now();
        let mut last = self.text_content(content_selector).await.unwrap_or_default();

        loop {
            if started.elapsed() >= deadline {
                return Err(ProviderError::Timeout);
            }

            tokio::select! {
                () = tokio::time::sleep(poll_interval) => {}
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            }

            let current = self.text_content(content_selector).await.unwrap_or_default();
            let stop_present = self.page.find_element(stop_selector).await.is_ok();

            if current == last && !current.is_empty() && !stop_present {
                return Ok(current);
            }
            last = current;
        }
    }

    /// Subscribes to `Network.responseReceived`, so a provider can inspect
    /// every HTTP response observed during the session and pick out the
    /// chat/completion endpoint carrying the SSE stream.
    pub async fn response_events(
        &self,
    ) -> Result<impl futures::Stream<Item = EventResponseReceived>, ProviderError> {
        self.page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| ProviderError::Provider(format!("event listener: {e}")))
    }

    pub async fn response_body(&self, request_id: RequestId) -> Result<String, ProviderError> {
        let body = self
            .page
            .execute(GetResponseBodyParams::new(request_id))
            .await
            .map_err(|e| ProviderError::Provider(format!("response body: {e}")))?;
        Ok(body.result.body.clone())
    }

    pub async fn close(mut self) -> Result<(), ProviderError> {
        self.browser
            .close()
            .await
            .map_err(|e| ProviderError::Provider(format!("browser close: {e}")))?;
        Ok(())
    }
}

async fn run_cancellable<F, T, E>(
    fut: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<Result<T, E>, ProviderError>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    tokio::select! {
        result = timeout(deadline, fut) => result.map_err(|_| ProviderError::Timeout),
        () = cancel.cancelled() => Err(ProviderError::Cancelled),
    }
}
