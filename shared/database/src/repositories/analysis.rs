//! Analysis Repository
//!
//! Fused classification results persisted per document.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use lexbid_models::AnalysisRecord;

const COLUMNS: &str = "id, document_id, file_name, content_hash, category, confidence_score, \
                       fusion_source, ai_analysis, created_at";

#[derive(Clone)]
pub struct AnalysisRepository {
    pool: PgPool,
}

impl AnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, record: &AnalysisRecord) -> Result<AnalysisRecord> {
        let query = format!(
            r#"
            INSERT INTO document_analyses
                (id, document_id, file_name, content_hash, category, confidence_score,
                 fusion_source, ai_analysis, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        );

        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(record.id)
            .bind(record.document_id)
            .bind(&record.file_name)
            .bind(&record.content_hash)
            .bind(&record.category)
            .bind(record.confidence_score)
            .bind(&record.fusion_source)
            .bind(&record.ai_analysis)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to save document analysis")
    }

    /// Most recent analysis for a document.
    pub async fn find_latest(&self, document_id: Uuid) -> Result<Option<AnalysisRecord>> {
        let query = format!(
            "SELECT {} FROM document_analyses WHERE document_id = $1 ORDER BY created_at DESC LIMIT 1",
            COLUMNS
        );

        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch latest document analysis")
    }

    /// Most recent analysis of any document with identical content.
    pub async fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<AnalysisRecord>> {
        let query = format!(
            "SELECT {} FROM document_analyses WHERE content_hash = $1 ORDER BY created_at DESC LIMIT 1",
            COLUMNS
        );

        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch document analysis by content hash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexbid_models::{ClassificationResult, DocumentCategory, FusedResult, FusionSource};
    use proptest::prelude::*;

    proptest! {
        /// A stored record keeps the fused category and confidence in its columns.
        #[test]
        fn prop_record_columns_match_fused_result(
            index in 0usize..5,
            confidence in 0.0..=1.0f64,
            agreeing in 2usize..5,
        ) {
            let category = DocumentCategory::ALL[index];
            let fused = FusedResult::from_result(
                &ClassificationResult::new(category, confidence),
                FusionSource::Consensus(agreeing),
            );

            let record = AnalysisRecord::new(Uuid::new_v4(), "scan.png", "00ff", &fused);
            prop_assert_eq!(record.category.as_str(), category.as_str());
            prop_assert_eq!(record.confidence_score, confidence);
            prop_assert_eq!(record.fusion_source.clone(), format!("consensus_{}_sources", agreeing));
            prop_assert_eq!(record.fused_result().map(|f| f.category), Some(category));
        }
    }
}
