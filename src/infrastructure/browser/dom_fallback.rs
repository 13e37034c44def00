//! DOM fallback extractor — spec.md section 4.5.
//!
//! Invoked only when the streaming interceptor yields zero citations.
//! Walks the rendered answer container for external anchor elements,
//! filtering out the platform's own domains, and harvests href/visible
//! text/nearby sibling text as a snippet. Enumerating descendant elements
//! and sibling text is done in the page's own JS engine — far cheaper
//! than round-tripping every node through CDP.

use serde::Deserialize;

use crate::domain::errors::ProviderError;
use crate::domain::models::RawCitation;

use super::session::BrowserSession;

const EXTRACT_SCRIPT_TEMPLATE: &str = r"
(() => {
  const container = document.querySelector(%CONTAINER%);
  if (!container) return [];
  const anchors = Array.from(container.querySelectorAll('a[href^=\"http\"]'));
  const ownDomains = %OWN_DOMAINS%;
  const results = [];
  anchors.forEach((a, i) => {
    let host;
    try { host = new URL(a.href).hostname; } catch (e) { return; }
    if (ownDomains.some(d => host.endsWith(d))) return;
    const marker = a.closest('[data-citation-index]');
    const index = marker ? parseInt(marker.getAttribute('data-citation-index'), 10) : null;
    const sibling = a.nextElementSibling;
    const snippet = sibling ? sibling.textContent.trim().slice(0, 280) : null;
    results.push({
      url: a.href,
      title: a.textContent.trim() || null,
      snippet: snippet || null,
      index,
    });
  });
  return results;
})()
";

#[derive(Debug, Deserialize)]
struct DomCitation {
    url: String,
    title: Option<String>,
    snippet: Option<String>,
    index: Option<i32>,
}

/// Harvests citations from the rendered DOM. `container_selector` is the
/// answer container; `own_domains` are platform hostnames to exclude.
/// Results are assigned `cite_index` from a `data-citation-index` marker
/// element when present, else by discovery order — merging into the
/// per-session citation set uses the same url-uniqueness rule as
/// interception (spec.md section 4.5).
pub async fn extract(
    session: &BrowserSession,
    container_selector: &str,
    own_domains: &[&str],
) -> Result<Vec<RawCitation>, ProviderError> {
    let own_domains_json = serde_json::to_string(own_domains)
        .map_err(|e| ProviderError::Provider(format!("dom fallback: {e}")))?;
    let container_json = serde_json::to_string(container_selector)
        .map_err(|e| ProviderError::Provider(format!("dom fallback: {e}")))?;
    let script = EXTRACT_SCRIPT_TEMPLATE
        .replace("%CONTAINER%", &container_json)
        .replace("%OWN_DOMAINS%", &own_domains_json);

    let raw: Vec<DomCitation> = session
        .page()
        .evaluate(script)
        .await
        .map_err(|e| ProviderError::Provider(format!("dom eval: {e}")))?
        .into_value()
        .map_err(|e| ProviderError::Provider(format!("dom eval decode: {e}")))?;

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(position, c)| RawCitation {
            url: c.url,
            title: c.title,
            snippet: c.snippet,
            site_name: None,
            cite_index: c.index.unwrap_or(position as i32),
            query_indexes: Vec::new(),
        })
        .collect())
}
