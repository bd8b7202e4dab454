use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewSubmission, Submission};

/// Persistence for submission metadata. No update operation exists.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, new: NewSubmission) -> anyhow::Result<Submission>;

    /// Every record, oldest first.
    async fn list_all(&self) -> anyhow::Result<Vec<Submission>>;

    /// Returns the removed record, or `None` if the id was unknown.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Submission>>;
}

#[derive(Clone)]
pub struct PgSubmissionStore {
    db: PgPool,
}

impl PgSubmissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, new: NewSubmission) -> anyhow::Result<Submission> {
        let row = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (id, student_id, student_name, file_key)
            VALUES ($1, $2, $3, $4)
            RETURNING id, student_id, student_name, file_key, submitted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.student_id)
        .bind(&new.student_name)
        .bind(&new.file_key)
        .fetch_one(&self.db)
        .await
        .context("insert submission")?;
        Ok(row)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(
            r#"
            SELECT id, student_id, student_name, file_key, submitted_at
              FROM submissions
             ORDER BY submitted_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list submissions")?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>(
            r#"
            DELETE FROM submissions
             WHERE id = $1
            RETURNING id, student_id, student_name, file_key, submitted_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete submission")?;
        Ok(row)
    }
}
