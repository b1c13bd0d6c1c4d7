use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    // Fused classification per analysis run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_analyses (
            id UUID PRIMARY KEY,
            document_id UUID NOT NULL,
            file_name VARCHAR NOT NULL,
            content_hash VARCHAR(64) NOT NULL,
            category VARCHAR NOT NULL,
            confidence_score DOUBLE PRECISION NOT NULL,
            fusion_source VARCHAR NOT NULL,
            ai_analysis JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Background AI task status
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_tasks (
            id UUID PRIMARY KEY,
            document_id UUID NOT NULL,
            task_type VARCHAR NOT NULL,
            status VARCHAR NOT NULL,
            result JSONB,
            error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_analyses_document_id ON document_analyses(document_id, created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_analyses_content_hash ON document_analyses(content_hash)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ai_tasks_document_id ON ai_tasks(document_id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
