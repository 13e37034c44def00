//! Hosted-chat provider — spec.md section 4.2, generic over a per-platform
//! `ChatDriver` strategy. DeepSeek and Doubao are the two concrete drivers;
//! both share the same browser-session lifecycle (navigate, toggle web
//! search, submit, wait for stable generation, intercept/fallback), which
//! is exactly the re-architecture spec.md section 9 calls for: a
//! provider-specific strategy rather than one DOM shape assumed for all
//! platforms.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::FusedFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;
use crate::domain::models::{SearchOutput, TaskSettings};
use crate::domain::ports::provider::Provider;
use crate::infrastructure::browser::dom_fallback;
use crate::infrastructure::browser::{BrowserSession, StreamInterceptor};
use crate::infrastructure::sse::{collect, SessionAccumulator, StreamEvent};

/// Per-platform strategy a `HostedChatProvider` drives through. Selector
/// heuristics are platform-specific and brittle by nature (spec.md's open
/// question 1); a driver never assumes its DOM shape applies to another
/// platform.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    fn platform_name(&self) -> &'static str;
    fn chat_url(&self) -> &'static str;
    fn profile_subdir(&self) -> &'static str;
    fn input_selector(&self) -> &'static str;
    fn content_selector(&self) -> &'static str;
    fn stop_selector(&self) -> &'static str;
    fn own_domains(&self) -> &'static [&'static str];

    /// True when `url` is the platform's chat-completion streaming
    /// endpoint — the discriminator the interceptor uses to decide which
    /// network responses to inspect at all.
    fn is_chat_endpoint(&self, url: &str) -> bool;

    /// Ensures the "web search" affordance is active before submitting,
    /// using whatever CSS-class/computed-color heuristic this platform's
    /// UI exposes (spec.md section 4.2 / open question 1). A best-effort
    /// operation: failure to detect state is logged and treated as
    /// already-enabled rather than aborting the unit.
    async fn ensure_web_search_enabled(
        &self,
        session: &BrowserSession,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Clicks whatever send affordance this platform uses once the prompt
    /// has been typed into `input_selector`.
    async fn submit(
        &self,
        session: &BrowserSession,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;
}

pub struct HostedChatProvider<D: ChatDriver> {
    driver: D,
    profile_root: PathBuf,
    login_wait_budget: Duration,
    poll_interval: Duration,
}

impl<D: ChatDriver> HostedChatProvider<D> {
    #[must_use]
    pub fn new(driver: D, profile_root: PathBuf) -> Self {
        Self {
            driver,
            profile_root,
            login_wait_budget: Duration::from_secs(120),
            poll_interval: Duration::from_millis(800),
        }
    }

    fn profile_dir(&self) -> PathBuf {
        self.profile_root.join(self.driver.profile_subdir())
    }
}

#[async_trait]
impl<D: ChatDriver> Provider for HostedChatProvider<D> {
    fn name(&self) -> &'static str {
        self.driver.platform_name()
    }

    async fn search(
        &self,
        _keyword: &str,
        prompt: &str,
        settings: &TaskSettings,
        cancel: CancellationToken,
    ) -> Result<SearchOutput, ProviderError> {
        let op_deadline = Duration::from_millis(settings.timeout_ms);
        let profile_dir = self.profile_dir();

        let session = BrowserSession::launch(&profile_dir, settings.headless).await?;

        let result = self.run_session(&session, prompt, op_deadline, &cancel).await;

        // Best-effort close regardless of outcome; a session left open
        // would otherwise leak past this unit's lifetime.
        let _ = session.close().await;

        result
    }
}

impl<D: ChatDriver> HostedChatProvider<D> {
    async fn run_session(
        &self,
        session: &BrowserSession,
        prompt: &str,
        op_deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<SearchOutput, ProviderError> {
        session.navigate(self.driver.chat_url(), op_deadline, cancel).await?;

        if self.login_gate_detected(session).await {
            return Err(ProviderError::AuthRequired);
        }

        self.driver
            .ensure_web_search_enabled(session, op_deadline, cancel)
            .await?;

        session
            .type_into(self.driver.input_selector(), prompt, op_deadline, cancel)
            .await?;
        self.driver.submit(session, op_deadline, cancel).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let interceptor = StreamInterceptor::new(session);
        let intercept_cancel = cancel.child_token();

        // The interceptor borrows `session`, so it can't be detached via
        // `tokio::spawn` (which requires `'static`); instead it's raced
        // in-place against the stability poll with `fuse()` so once one
        // side finishes the other keeps being polled without panicking on
        // re-poll-after-ready (spec.md section 9's channel-per-session
        // model, adapted to a single-task consumer).
        let collect_handle = tokio::spawn(collect(rx));

        let mut intercept_fut = Box::pin(
            interceptor
                .run(
                    |url| self.driver.is_chat_endpoint(url),
                    tx.clone(),
                    intercept_cancel.child_token(),
                )
                .fuse(),
        );
        let mut stability_fut = Box::pin(
            session
                .wait_for_stable_content(
                    self.driver.content_selector(),
                    self.driver.stop_selector(),
                    self.poll_interval,
                    op_deadline,
                    cancel,
                )
                .fuse(),
        );

        let stability_result = loop {
            tokio::select! {
                result = &mut stability_fut => break result,
                _ = &mut intercept_fut, if !intercept_fut.is_terminated() => {},
            }
        };
        intercept_cancel.cancel();
        // Drop both the sender and the interceptor future (which holds its
        // own clone) so the collector's receiver observes channel closure
        // and returns instead of waiting forever.
        drop(tx);
        drop(intercept_fut);
        stability_result?;

        let accumulator: SessionAccumulator = collect_handle
            .await
            .map_err(|e| ProviderError::Provider(format!("interceptor task: {e}")))?;

        let mut citations = accumulator.citations;
        if citations.is_empty() {
            if let Ok(dom_citations) =
                dom_fallback::extract(session, self.driver.content_selector(), self.driver.own_domains()).await
            {
                citations = dom_citations;
            }
        }

        let answer_text = session
            .text_content(self.driver.content_selector())
            .await
            .unwrap_or(accumulator.answer_text);

        Ok(SearchOutput {
            answer_text,
            sub_queries: accumulator.sub_queries,
            citations,
        })
    }

    /// A login gate is an unbypassable obstacle within this unit's budget
    /// (spec.md section 4.2): the URL still carries a login marker, or the
    /// login form is present, after waiting up to `login_wait_budget`.
    async fn login_gate_detected(&self, session: &BrowserSession) -> bool {
        let started = Instant::now();
        loop {
            let current_url = session
                .page()
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if !current_url.to_lowercase().contains("login") {
                return false;
            }
            if started.elapsed() >= self.login_wait_budget {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}
