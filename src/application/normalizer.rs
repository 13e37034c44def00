//! Result Normalizer — spec.md section 4.6.
//!
//! A pure function over owned data: no I/O, no async, so the dedup /
//! ordering / encoding-repair rules can be property-tested independent of
//! the browser and network layers (spec.md section 9).

use std::collections::HashMap;

use crate::domain::models::{CitationInput, NormalizedOutput, RawCitation, SearchOutput};
use crate::infrastructure::text::{extract_registrable_domain, repair_encoding};

/// Deduplicates citations by url (first-seen fields win), assigns stable
/// `cite_index` ordering, repairs encoding on every extracted string, and
/// keeps sub-queries in first-seen order with duplicates removed.
#[must_use]
pub fn normalize(output: SearchOutput) -> NormalizedOutput {
    let answer_text = repair_encoding(&output.answer_text);

    let mut seen_queries = HashMap::new();
    let sub_queries: Vec<String> = output
        .sub_queries
        .into_iter()
        .map(|q| repair_encoding(&q))
        .filter(|q| seen_queries.insert(q.clone(), ()).is_none())
        .collect();

    let mut seen_urls: HashMap<String, usize> = HashMap::new();
    let mut citations: Vec<RawCitation> = Vec::new();
    for (position, raw) in output.citations.into_iter().enumerate() {
        if raw.url.is_empty() {
            continue;
        }
        let repaired = RawCitation {
            url: repair_encoding(&raw.url),
            title: raw.title.map(|t| repair_encoding(&t)),
            snippet: raw.snippet.map(|s| repair_encoding(&s)),
            site_name: raw.site_name.map(|s| repair_encoding(&s)),
            cite_index: raw.cite_index,
            query_indexes: raw.query_indexes,
        };
        if seen_urls.contains_key(&repaired.url) {
            continue;
        }
        seen_urls.insert(repaired.url.clone(), position);
        citations.push(repaired);
    }

    // Ordering rule (invariant 8): sort by cite_index ascending, with
    // `cite_index == 0` ("unassigned") tailing the list; ties broken by
    // first-seen position, which the stable sort preserves.
    citations.sort_by_key(|c| (c.cite_index == 0, c.cite_index));

    NormalizedOutput {
        answer_text,
        sub_queries,
        citations,
    }
}

/// Resolves each normalized citation's registrable domain, turning it into
/// the shape the Persistence Orchestrator writes.
#[must_use]
pub fn to_citation_inputs(citations: &[RawCitation]) -> Vec<CitationInput> {
    citations
        .iter()
        .map(|c| CitationInput {
            cite_index: c.cite_index,
            url: c.url.clone(),
            domain: extract_registrable_domain(&c.url),
            title: c.title.clone(),
            snippet: c.snippet.clone(),
            site_name: c.site_name.clone(),
            query_indexes: if c.query_indexes.is_empty() {
                None
            } else {
                Some(c.query_indexes.clone())
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_citations_by_url_keeping_first_seen_fields() {
        let output = SearchOutput {
            answer_text: "answer".to_string(),
            sub_queries: vec![],
            citations: vec![
                RawCitation {
                    title: Some("First".to_string()),
                    ..RawCitation::new("https://x/a")
                },
                RawCitation {
                    title: Some("Second".to_string()),
                    ..RawCitation::new("https://x/a")
                },
            ],
        };
        let normalized = normalize(output);
        assert_eq!(normalized.citations.len(), 1);
        assert_eq!(normalized.citations[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn drops_citations_with_empty_url() {
        let output = SearchOutput {
            answer_text: String::new(),
            sub_queries: vec![],
            citations: vec![RawCitation::new("")],
        };
        let normalized = normalize(output);
        assert!(normalized.citations.is_empty());
    }

    #[test]
    fn dedups_sub_queries_preserving_first_seen_order() {
        let output = SearchOutput {
            answer_text: String::new(),
            sub_queries: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            citations: vec![],
        };
        let normalized = normalize(output);
        assert_eq!(normalized.sub_queries, vec!["a", "b"]);
    }

    #[test]
    fn unassigned_cite_index_zero_tails_ordering() {
        let output = SearchOutput {
            answer_text: String::new(),
            sub_queries: vec![],
            citations: vec![
                RawCitation {
                    cite_index: 0,
                    ..RawCitation::new("https://x/unassigned")
                },
                RawCitation {
                    cite_index: 2,
                    ..RawCitation::new("https://x/2")
                },
                RawCitation {
                    cite_index: 1,
                    ..RawCitation::new("https://x/1")
                },
            ],
        };
        let normalized = normalize(output);
        let urls: Vec<&str> = normalized.citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/1", "https://x/2", "https://x/unassigned"]);
    }

    #[test]
    fn repairs_mojibake_in_every_string_field() {
        let mojibake_title = "中文".as_bytes().iter().map(|&b| b as char).collect::<String>();
        let output = SearchOutput {
            answer_text: String::new(),
            sub_queries: vec![],
            citations: vec![RawCitation {
                title: Some(mojibake_title),
                ..RawCitation::new("https://x/1")
            }],
        };
        let normalized = normalize(output);
        assert_eq!(normalized.citations[0].title.as_deref(), Some("中文"));
    }

    #[test]
    fn resolves_registrable_domain_on_conversion() {
        let raw = vec![RawCitation::new("https://sub.example.co.uk/a")];
        let inputs = to_citation_inputs(&raw);
        assert_eq!(inputs[0].domain, "example.co.uk");
    }
}
