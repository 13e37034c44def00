//! The neutral `{answer_text, sub_queries, citations}` triple every
//! provider produces — spec.md section 4.2.

use crate::domain::models::citation::RawCitation;
use serde::{Deserialize, Serialize};

/// Output of one `Provider::search` call, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutput {
    pub answer_text: String,
    pub sub_queries: Vec<String>,
    pub citations: Vec<RawCitation>,
}

/// Output after the Result Normalizer has deduplicated citations, assigned
/// stable indices, and repaired encoding — spec.md section 4.6.
#[derive(Debug, Clone, Default)]
pub struct NormalizedOutput {
    pub answer_text: String,
    pub sub_queries: Vec<String>,
    pub citations: Vec<RawCitation>,
}
