use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Citation, CitationInput, DomainStats, ExecutorSubQueryLog, ExportRow, SearchRecord, SearchStatus,
};
use crate::domain::ports::search_repository::{PersistUnit, SearchRepository};

pub struct SearchRepositoryImpl {
    pool: PgPool,
}

impl SearchRepositoryImpl {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchRepository for SearchRepositoryImpl {
    /// Implements spec.md section 4.7's four-step transactional write: one
    /// `SearchRecord`, its ordered `SearchQuery` rows, de-duplicated
    /// `Citation` rows (with a `domain_stats` upsert on genuine insert
    /// only), and one `ExecutorSubQueryLog` row per citation.
    async fn persist_unit(&self, unit: PersistUnit) -> DomainResult<SearchRecord> {
        let mut tx = self.pool.begin().await?;

        let record: (
            i64,
            String,
            String,
            String,
            String,
            String,
            Option<i64>,
            String,
            Option<String>,
            Option<i64>,
            Option<i64>,
            chrono::DateTime<chrono::Utc>,
        ) = sqlx::query_as(
            r#"
            INSERT INTO search_records
                (keyword, platform, prompt_type, prompt, full_answer,
                 response_time_ms, search_status, error_message, task_id, task_query_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, keyword, platform, prompt_type, prompt, full_answer,
                      response_time_ms, search_status, error_message, task_id,
                      task_query_id, created_at
            "#,
        )
        .bind(&unit.record.keyword)
        .bind(&unit.record.platform)
        .bind(&unit.record.prompt_type)
        .bind(&unit.record.prompt)
        .bind(&unit.record.full_answer)
        .bind(unit.record.response_time_ms)
        .bind(unit.record.search_status.as_str())
        .bind(&unit.record.error_message)
        .bind(unit.record.task_id)
        .bind(unit.record.task_query_id)
        .fetch_one(&mut *tx)
        .await?;
        let record_id = record.0;

        for (i, query) in unit.sub_queries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO search_queries (record_id, query, query_order) VALUES ($1, $2, $3)",
            )
            .bind(record_id)
            .bind(query)
            .bind((i + 1) as i32)
            .execute(&mut *tx)
            .await?;
        }

        for citation in &unit.citations {
            let query_indexes = citation
                .query_indexes
                .as_ref()
                .map(|v| serde_json::to_value(v))
                .transpose()?;

            let inserted: Option<(i64,)> = sqlx::query_as(
                r#"
                INSERT INTO citations (record_id, cite_index, url, domain, title, snippet, site_name, query_indexes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (record_id, url) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(record_id)
            .bind(citation.cite_index)
            .bind(&citation.url)
            .bind(&citation.domain)
            .bind(&citation.title)
            .bind(&citation.snippet)
            .bind(&citation.site_name)
            .bind(&query_indexes)
            .fetch_optional(&mut *tx)
            .await?;

            let citation_id = match inserted {
                Some((id,)) => {
                    upsert_domain_stats(&mut tx, &citation.domain, &unit.record.platform).await?;
                    id
                }
                None => {
                    let (existing,): (i64,) = sqlx::query_as(
                        "SELECT id FROM citations WHERE record_id = $1 AND url = $2",
                    )
                    .bind(record_id)
                    .bind(&citation.url)
                    .fetch_one(&mut *tx)
                    .await?;
                    existing
                }
            };

            sqlx::query(
                r#"
                INSERT INTO executor_sub_query_log
                    (task_query_id, sub_query, record_id, citation_id, url, domain, title, snippet, site_name, cite_index)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(unit.record.task_query_id)
            .bind(resolve_sub_query(citation, &unit.sub_queries))
            .bind(record_id)
            .bind(citation_id)
            .bind(&citation.url)
            .bind(&citation.domain)
            .bind(&citation.title)
            .bind(&citation.snippet)
            .bind(&citation.site_name)
            .bind(citation.cite_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(record_id, citations = unit.citations.len(), "unit persisted");

        Ok(SearchRecord {
            id: record.0,
            keyword: record.1,
            platform: record.2,
            prompt_type: record.3,
            prompt: record.4,
            full_answer: record.5,
            response_time_ms: record.6,
            search_status: parse_status(&record.7),
            error_message: record.8,
            task_id: record.9,
            task_query_id: record.10,
            created_at: record.11,
        })
    }

    async fn records_for_task(&self, task_id: i64) -> DomainResult<Vec<SearchRecord>> {
        let rows: Vec<(
            i64,
            String,
            String,
            String,
            String,
            String,
            Option<i64>,
            String,
            Option<String>,
            Option<i64>,
            Option<i64>,
            chrono::DateTime<chrono::Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, keyword, platform, prompt_type, prompt, full_answer,
                   response_time_ms, search_status, error_message, task_id,
                   task_query_id, created_at
            FROM search_records WHERE task_id = $1
            ORDER BY task_query_id, platform, created_at
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SearchRecord {
                id: r.0,
                keyword: r.1,
                platform: r.2,
                prompt_type: r.3,
                prompt: r.4,
                full_answer: r.5,
                response_time_ms: r.6,
                search_status: parse_status(&r.7),
                error_message: r.8,
                task_id: r.9,
                task_query_id: r.10,
                created_at: r.11,
            })
            .collect())
    }

    async fn citations_for_record(&self, record_id: i64) -> DomainResult<Vec<Citation>> {
        let rows: Vec<(
            i64,
            i64,
            i32,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<serde_json::Value>,
        )> = sqlx::query_as(
            r#"
            SELECT id, record_id, cite_index, url, domain, title, snippet, site_name, query_indexes
            FROM citations WHERE record_id = $1
            ORDER BY cite_index ASC, id ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Citation {
                    id: r.0,
                    record_id: r.1,
                    cite_index: r.2,
                    url: r.3,
                    domain: r.4,
                    title: r.5,
                    snippet: r.6,
                    site_name: r.7,
                    query_indexes: r.8.map(serde_json::from_value).transpose()?,
                })
            })
            .collect::<Result<_, serde_json::Error>>()
            .map_err(Into::into)
    }

    async fn sub_query_log_for_task(&self, task_id: i64) -> DomainResult<Vec<ExecutorSubQueryLog>> {
        fetch_sub_query_log(&self.pool, task_id).await
    }

    async fn domain_stats(&self, domain: &str) -> DomainResult<Option<DomainStats>> {
        let row: Option<(String, i64, i64, serde_json::Value, chrono::DateTime<chrono::Utc>)> =
            sqlx::query_as(
                "SELECT domain, total_citations, keyword_coverage, platforms, last_seen FROM domain_stats WHERE domain = $1",
            )
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| DomainStats {
            domain: r.0,
            total_citations: r.1,
            keyword_coverage: r.2,
            platforms: r.3,
            last_seen: r.4,
        }))
    }

    async fn export_rows_for_task(&self, task_id: i64) -> DomainResult<Vec<ExportRow>> {
        let rows: Vec<(
            String,
            String,
            Option<String>,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            i32,
            chrono::DateTime<chrono::Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT r.keyword, r.platform, l.sub_query, l.url, l.domain,
                   l.title, l.snippet, l.site_name, l.cite_index, r.created_at
            FROM executor_sub_query_log l
            JOIN search_records r ON r.id = l.record_id
            WHERE r.task_id = $1
            ORDER BY r.task_query_id, r.created_at, l.id
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ExportRow {
                task_id,
                keyword: r.0,
                platform: r.1,
                sub_query: r.2,
                url: r.3,
                domain: r.4,
                title: r.5,
                snippet: r.6,
                site_name: r.7,
                cite_index: r.8,
                created_at: r.9,
            })
            .collect())
    }
}

async fn fetch_sub_query_log(pool: &PgPool, task_id: i64) -> DomainResult<Vec<ExecutorSubQueryLog>> {
    let rows: Vec<(
        i64,
        Option<i64>,
        Option<String>,
        i64,
        Option<i64>,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        i32,
    )> = sqlx::query_as(
        r#"
        SELECT l.id, l.task_query_id, l.sub_query, l.record_id, l.citation_id,
               l.url, l.domain, l.title, l.snippet, l.site_name, l.cite_index
        FROM executor_sub_query_log l
        JOIN search_records r ON r.id = l.record_id
        WHERE r.task_id = $1
        ORDER BY l.task_query_id, r.created_at, l.id
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ExecutorSubQueryLog {
            id: r.0,
            task_query_id: r.1,
            sub_query: r.2,
            record_id: r.3,
            citation_id: r.4,
            url: r.5,
            domain: r.6,
            title: r.7,
            snippet: r.8,
            site_name: r.9,
            cite_index: r.10,
        })
        .collect())
}

async fn upsert_domain_stats(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    domain: &str,
    platform: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO domain_stats (domain, total_citations, keyword_coverage, platforms, last_seen)
        VALUES ($1, 1, 1, jsonb_build_object($2::text, 1), now())
        ON CONFLICT (domain) DO UPDATE SET
            total_citations = domain_stats.total_citations + 1,
            platforms = jsonb_set(
                domain_stats.platforms,
                ARRAY[$2::text],
                to_jsonb(COALESCE((domain_stats.platforms->>$2)::bigint, 0) + 1)
            ),
            last_seen = now()
        "#,
    )
    .bind(domain)
    .bind(platform)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Binding rule from spec.md section 4.7: prefer the citation's own
/// `query_indexes[0]`, else the record's sole sub-query, else null.
fn resolve_sub_query(citation: &CitationInput, sub_queries: &[String]) -> Option<String> {
    if let Some(indexes) = &citation.query_indexes {
        if let Some(&first) = indexes.first() {
            if first >= 0 {
                if let Some(resolved) = sub_queries.get(first as usize) {
                    return Some(resolved.clone());
                }
            }
        }
    }
    if sub_queries.len() == 1 {
        return sub_queries.first().cloned();
    }
    None
}

fn parse_status(s: &str) -> SearchStatus {
    if s == "completed" {
        SearchStatus::Completed
    } else {
        SearchStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation_with_indexes(indexes: Vec<i32>) -> CitationInput {
        CitationInput {
            cite_index: 1,
            url: "https://x/1".to_string(),
            domain: "x".to_string(),
            title: None,
            snippet: None,
            site_name: None,
            query_indexes: Some(indexes),
        }
    }

    #[test]
    fn resolves_sub_query_at_in_range_index() {
        let citation = citation_with_indexes(vec![1]);
        let sub_queries = vec!["q0".to_string(), "q1".to_string()];
        assert_eq!(resolve_sub_query(&citation, &sub_queries).as_deref(), Some("q1"));
    }

    /// An out-of-range first index must fall through to the
    /// sole-sub-query fallback rather than short-circuiting to `None` —
    /// spec.md section 4.7's binding rule is gated on the index actually
    /// being in range, not merely non-negative.
    #[test]
    fn out_of_range_index_falls_back_to_sole_sub_query() {
        let citation = citation_with_indexes(vec![5]);
        let sub_queries = vec!["only".to_string()];
        assert_eq!(resolve_sub_query(&citation, &sub_queries).as_deref(), Some("only"));
    }

    #[test]
    fn out_of_range_index_with_multiple_sub_queries_yields_none() {
        let citation = citation_with_indexes(vec![5]);
        let sub_queries = vec!["a".to_string(), "b".to_string()];
        assert_eq!(resolve_sub_query(&citation, &sub_queries), None);
    }

    #[test]
    fn negative_index_falls_back_to_sole_sub_query() {
        let citation = citation_with_indexes(vec![-1]);
        let sub_queries = vec!["only".to_string()];
        assert_eq!(resolve_sub_query(&citation, &sub_queries).as_deref(), Some("only"));
    }
}
