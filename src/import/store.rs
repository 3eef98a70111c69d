//! Presentation row writes.

use crate::config::TableNames;
use crate::import::candidate::CandidateInfo;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;

/// Target of the single-row insert performed for each candidate.
pub trait PresentationStore: Send + Sync + 'static {
    /// Insert one presentation row and return the affected row count.
    fn insert_presentation(
        &self,
        candidate: &CandidateInfo,
        content: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

/// Inserts into the presentations table through the shared pool.
///
/// Each insert checks out its own pooled connection, so concurrent workers
/// never share a connection handle.
#[derive(Clone)]
pub struct PgPresentationStore {
    pool: PgPool,
    insert_sql: String,
}

impl PgPresentationStore {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(tables),
        }
    }
}

impl PresentationStore for PgPresentationStore {
    async fn insert_presentation(
        &self,
        candidate: &CandidateInfo,
        content: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&self.insert_sql)
            .bind(candidate.publication_id)
            .bind(candidate.component_id)
            .bind(candidate.template_id)
            .bind(content)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl<T: PresentationStore> PresentationStore for Arc<T> {
    fn insert_presentation(
        &self,
        candidate: &CandidateInfo,
        content: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send {
        (**self).insert_presentation(candidate, content)
    }
}

pub fn insert_statement(tables: &TableNames) -> String {
    format!(
        "INSERT INTO {} (publication_id, component_id, template_id, content) VALUES ($1, $2, $3, $4)",
        tables.presentations
    )
}
