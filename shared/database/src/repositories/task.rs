//! AI Task Repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use lexbid_models::{AiTask, TaskStatus};

#[derive(Clone)]
pub struct AiTaskRepository {
    pool: PgPool,
}

impl AiTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: &AiTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_tasks (id, document_id, task_type, status, result, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.id)
        .bind(task.document_id)
        .bind(&task.task_type)
        .bind(&task.status)
        .bind(&task.result)
        .bind(&task.error)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create AI task")?;

        Ok(())
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE ai_tasks
            SET status = $2, result = COALESCE($3, result), error = COALESCE($4, error), updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to update AI task")?;

        if updated.rows_affected() == 0 {
            anyhow::bail!("AI task {} not found", id);
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<AiTask>> {
        sqlx::query_as::<_, AiTask>(
            r#"
            SELECT id, document_id, task_type, status, result, error, created_at, updated_at
            FROM ai_tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch AI task")
    }
}
