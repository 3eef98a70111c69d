//! Candidate discovery.
//!
//! Candidates are metadata rows with no matching presentation row. Imported
//! rows drop out of the anti-join on the next run, which is what makes
//! repeated runs converge to a no-op.

use crate::config::TableNames;
use crate::import::candidate::CandidateInfo;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::PgPool;

/// Produces the candidates for one run.
///
/// The stream is not restartable; a fresh run calls `candidates` again. A
/// query failure must surface as an `Err` item, never as an empty stream.
pub trait CandidateSource {
    fn candidates(&self) -> BoxStream<'_, Result<CandidateInfo, sqlx::Error>>;
}

/// Streams candidates straight off a Postgres cursor.
pub struct PgCandidateSource {
    pool: PgPool,
    query: String,
}

impl PgCandidateSource {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            query: candidate_query(tables),
        }
    }
}

impl CandidateSource for PgCandidateSource {
    fn candidates(&self) -> BoxStream<'_, Result<CandidateInfo, sqlx::Error>> {
        log::debug!("issuing candidate query");

        sqlx::query_as::<_, (i32, i32, i32, String)>(&self.query)
            .fetch(&self.pool)
            .map(|row| row.map(CandidateInfo::from))
            .boxed()
    }
}

/// Anti-join of the metadata table against the presentations table on
/// (publication, template, component).
pub fn candidate_query(tables: &TableNames) -> String {
    format!(
        r#"SELECT m.publication_id, m.component_ref_id, m.component_template_id, m.component_output_format
           FROM {metadata} AS m
           LEFT JOIN {presentations} AS p
             ON m.publication_id = p.publication_id
            AND m.component_template_id = p.template_id
            AND m.component_ref_id = p.component_id
           WHERE p.component_id IS NULL"#,
        metadata = tables.metadata,
        presentations = tables.presentations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_uses_configured_tables() {
        let tables = TableNames {
            metadata: "tridion.cp_meta".to_string(),
            presentations: "tridion.cp".to_string(),
            db_info: None,
        };

        let query = candidate_query(&tables);
        assert!(query.contains("FROM tridion.cp_meta AS m"));
        assert!(query.contains("LEFT JOIN tridion.cp AS p"));
        assert!(query.contains("WHERE p.component_id IS NULL"));
    }
}
