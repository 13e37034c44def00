//! Envelope-shape decoder cascade — spec.md section 4.3.
//!
//! Turns one decoded SSE `data:` payload into a neutral
//! `{sub_queries, citations, answer_chunk}` triple. Generalizes the
//! dynamic dispatch-on-string-keys pattern into a tagged-union decoder: a
//! function per envelope shape with a cheap discriminator, tried in a
//! fixed cascade (spec.md section 9).

use serde_json::Value;

use crate::domain::models::RawCitation;

/// What a single envelope payload contributed to the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedEnvelope {
    pub sub_queries: Vec<String>,
    pub citations: Vec<RawCitation>,
    pub answer_chunk: Option<String>,
}

/// Parses `payload` as JSON and dispatches it through the envelope-shape
/// cascade. Unparseable payloads and payloads matching no known shape
/// yield an empty, no-op envelope rather than an error — a single
/// malformed event must not abort the session.
#[must_use]
pub fn decode_envelope(payload: &str) -> DecodedEnvelope {
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return DecodedEnvelope::default();
    };

    try_whole_fragment(&value)
        .or_else(|| try_incremental_path(&value))
        .or_else(|| try_patch_op(&value))
        .or_else(|| try_root_results(&value))
        .or_else(|| try_content_only(&value))
        .unwrap_or_default()
}

/// Shape 1: `{v: {response: {fragments: [...]}}}`. SEARCH-type fragments
/// carry `queries[]`/`results[]`; other fragment types are ignored.
fn try_whole_fragment(value: &Value) -> Option<DecodedEnvelope> {
    let fragments = value.get("v")?.get("response")?.get("fragments")?.as_array()?;
    let mut out = DecodedEnvelope::default();
    for fragment in fragments {
        if fragment.get("type").and_then(Value::as_str) == Some("SEARCH") {
            if let Some(queries) = fragment.get("queries") {
                out.sub_queries.extend(extract_queries(queries));
            }
            if let Some(results) = fragment.get("results") {
                out.citations.extend(extract_citations(results));
            }
        }
    }
    Some(out)
}

/// Shape 2: `{p: "response/fragments/-1/results", v: [...]}`. Falls back
/// to inspecting the first element of `v` when `p` is absent.
fn try_incremental_path(value: &Value) -> Option<DecodedEnvelope> {
    let v_value = value.get("v")?;
    let v_array = v_value.as_array()?;
    let mut out = DecodedEnvelope::default();

    if let Some(path) = value.get("p").and_then(Value::as_str) {
        if path.ends_with("results") {
            out.citations.extend(extract_citations(v_value));
            return Some(out);
        }
        if path.ends_with("queries") {
            out.sub_queries.extend(extract_queries(v_value));
            return Some(out);
        }
        return None;
    }

    match v_array.first() {
        Some(first) if first.get("url").is_some() => {
            out.citations.extend(extract_citations(v_value));
            Some(out)
        }
        Some(first) if first.is_string() => {
            out.sub_queries.extend(extract_queries(v_value));
            Some(out)
        }
        _ => None,
    }
}

/// Shape 3 (Doubao-style): `{patch_op: [{patch_object, patch_type,
/// patch_value}]}`. Only `patch_object=1, patch_type=1` patches carry
/// content; block_type 10000 is an answer-text fragment, 10025 is a
/// search-result block whose entries are `text_card`/`video_card` unions.
fn try_patch_op(value: &Value) -> Option<DecodedEnvelope> {
    let patches = value.get("patch_op")?.as_array()?;
    let mut out = DecodedEnvelope::default();

    for patch in patches {
        let patch_object = patch.get("patch_object").and_then(Value::as_i64);
        let patch_type = patch.get("patch_type").and_then(Value::as_i64);
        if patch_object != Some(1) || patch_type != Some(1) {
            continue;
        }

        let Some(blocks) = patch
            .get("patch_value")
            .and_then(|v| v.get("content_block"))
            .and_then(Value::as_array)
        else {
            continue;
        };

        for block in blocks {
            match block.get("block_type").and_then(Value::as_i64) {
                Some(10000) => {
                    if let Some(text) = block
                        .get("content")
                        .and_then(|c| c.get("text_block"))
                        .and_then(|t| t.get("text"))
                        .and_then(Value::as_str)
                    {
                        out.answer_chunk
                            .get_or_insert_with(String::new)
                            .push_str(text);
                    }
                }
                Some(10025) => {
                    let Some(block_content) = block
                        .get("content")
                        .and_then(|c| c.get("search_query_result_block"))
                    else {
                        continue;
                    };
                    if let Some(queries) = block_content.get("queries") {
                        out.sub_queries.extend(extract_queries(queries));
                    }
                    if let Some(results) = block_content.get("results").and_then(Value::as_array) {
                        out.citations.extend(
                            results
                                .iter()
                                .enumerate()
                                .map(|(i, result)| parse_patch_result(result, i)),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    Some(out)
}

/// Shape 4: `results[]`/`queries[]` present at the payload root.
fn try_root_results(value: &Value) -> Option<DecodedEnvelope> {
    let results = value.get("results");
    let queries = value.get("queries");
    if results.is_none() && queries.is_none() {
        return None;
    }

    let mut out = DecodedEnvelope::default();
    if let Some(results) = results {
        out.citations.extend(extract_citations(results));
    }
    if let Some(queries) = queries {
        out.sub_queries.extend(extract_queries(queries));
    }
    Some(out)
}

/// Shape 5: a bare string fragment reached via `content`, `text`,
/// `message`, `answer`, or `delta.content`. No citation extraction.
fn try_content_only(value: &Value) -> Option<DecodedEnvelope> {
    let text = value
        .get("content")
        .or_else(|| value.get("text"))
        .or_else(|| value.get("message"))
        .or_else(|| value.get("answer"))
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .get("delta")
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
        })?;

    Some(DecodedEnvelope {
        answer_chunk: Some(text.to_string()),
        ..Default::default()
    })
}

fn extract_queries(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| arr.iter().filter_map(|q| q.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn extract_citations(value: &Value) -> Vec<RawCitation> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(i, c)| parse_citation(c, i))
                .collect()
        })
        .unwrap_or_default()
}

/// Unwraps a Doubao `text_card`/`video_card` tagged union before applying
/// the generic citation field extraction.
fn parse_patch_result(value: &Value, position: usize) -> RawCitation {
    let inner = value
        .get("text_card")
        .or_else(|| value.get("video_card"))
        .unwrap_or(value);
    parse_citation(inner, position)
}

/// Generic citation field extraction with the fallback chain from
/// spec.md section 4.3: `title`→`name`, `snippet`→`description`/`summary`,
/// `site_name`→`source`, `cite_index`→`index`→array position.
fn parse_citation(value: &Value, position: usize) -> RawCitation {
    let url = value
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let title = value
        .get("title")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let snippet = value
        .get("snippet")
        .or_else(|| value.get("description"))
        .or_else(|| value.get("summary"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let site_name = value
        .get("site_name")
        .or_else(|| value.get("source"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let cite_index = value
        .get("cite_index")
        .or_else(|| value.get("index"))
        .and_then(Value::as_i64)
        .map(|n| n as i32)
        .unwrap_or(position as i32);
    let query_indexes = value
        .get("query_indexes")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_i64).map(|n| n as i32).collect())
        .unwrap_or_default();

    RawCitation {
        url,
        title,
        snippet,
        site_name,
        cite_index,
        query_indexes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_whole_fragment_envelope() {
        let payload = r#"{"v":{"response":{"fragments":[{"type":"SEARCH","queries":["q1","q2"],"results":[{"url":"https://a/1","title":"A"}]}]}}}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.sub_queries, vec!["q1", "q2"]);
        assert_eq!(decoded.citations.len(), 1);
        assert_eq!(decoded.citations[0].url, "https://a/1");
    }

    #[test]
    fn decodes_incremental_path_results() {
        let payload = r#"{"p":"response/fragments/-1/results","v":[{"url":"https://b/1"}]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.citations.len(), 1);
        assert_eq!(decoded.citations[0].cite_index, 0);
    }

    #[test]
    fn decodes_incremental_path_queries() {
        let payload = r#"{"p":"response/fragments/-1/queries","v":["q1"]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.sub_queries, vec!["q1"]);
    }

    #[test]
    fn decodes_incremental_path_without_p_by_shape() {
        let payload = r#"{"v":[{"url":"https://c/1"}]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.citations.len(), 1);

        let payload = r#"{"v":["plain query"]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.sub_queries, vec!["plain query"]);
    }

    #[test]
    fn decodes_literal_e4_patch_op_envelope() {
        let payload = r#"{"patch_op":[{"patch_object":1,"patch_type":1,"patch_value":{"content_block":[{"block_type":10025,"content":{"search_query_result_block":{"queries":["q1"],"results":[{"text_card":{"url":"https://s/1","title":"T","index":1}}]}}}]}}]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.sub_queries, vec!["q1"]);
        assert_eq!(decoded.citations.len(), 1);
        assert_eq!(decoded.citations[0].url, "https://s/1");
        assert_eq!(decoded.citations[0].cite_index, 1);
        assert_eq!(decoded.citations[0].title.as_deref(), Some("T"));
    }

    #[test]
    fn decodes_patch_op_text_block() {
        let payload = r#"{"patch_op":[{"patch_object":1,"patch_type":1,"patch_value":{"content_block":[{"block_type":10000,"content":{"text_block":{"text":"hello "}}}]}}]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.answer_chunk.as_deref(), Some("hello "));
    }

    #[test]
    fn ignores_patches_with_other_object_or_type() {
        let payload = r#"{"patch_op":[{"patch_object":2,"patch_type":1,"patch_value":{"content_block":[{"block_type":10000,"content":{"text_block":{"text":"ignored"}}}]}}]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.answer_chunk, None);
    }

    #[test]
    fn decodes_root_results_envelope() {
        let payload = r#"{"results":[{"url":"https://d/1"}],"queries":["q"]}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.citations.len(), 1);
        assert_eq!(decoded.sub_queries, vec!["q"]);
    }

    #[test]
    fn decodes_content_only_envelope() {
        let payload = r#"{"content":"partial answer"}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.answer_chunk.as_deref(), Some("partial answer"));
        assert!(decoded.citations.is_empty());
    }

    #[test]
    fn decodes_delta_content_envelope() {
        let payload = r#"{"delta":{"content":"more text"}}"#;
        let decoded = decode_envelope(payload);
        assert_eq!(decoded.answer_chunk.as_deref(), Some("more text"));
    }

    #[test]
    fn unparseable_payload_yields_empty_envelope() {
        let decoded = decode_envelope("not json");
        assert_eq!(decoded, DecodedEnvelope::default());
    }

    #[test]
    fn citation_fallback_chain_applies() {
        let payload = r#"{"results":[{"url":"https://e/1","name":"N","description":"D","source":"S"}]}"#;
        let decoded = decode_envelope(payload);
        let citation = &decoded.citations[0];
        assert_eq!(citation.title.as_deref(), Some("N"));
        assert_eq!(citation.snippet.as_deref(), Some("D"));
        assert_eq!(citation.site_name.as_deref(), Some("S"));
    }
}
