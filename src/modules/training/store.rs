use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::grading::{self, TrainingStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompletionRow {
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRow {
    pub fn training_status(&self) -> Option<TrainingStatus> {
        TrainingStatus::parse(&self.status)
    }
}

/// Records a pending row the first time a user opens a training page.
/// Existing rows are never touched.
pub async fn mark_started(pool: &SqlitePool, user_id: i64, document_id: i64) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO training_completions (user_id, document_id, status, completed_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id, document_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(document_id)
    .bind(TrainingStatus::Pending.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Grades the comprehension answer and stores the outcome in one statement,
/// replacing whatever the user had before for this document.
pub async fn record_attempt(
    pool: &SqlitePool,
    user_id: i64,
    document_id: i64,
    submitted_answer: &str,
    correct_answer: &str,
) -> sqlx::Result<TrainingStatus> {
    let status = grading::grade_training_answer(submitted_answer, correct_answer);

    sqlx::query(
        "INSERT INTO training_completions (user_id, document_id, status, completed_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id, document_id) DO UPDATE SET
             status = excluded.status,
             completed_at = excluded.completed_at",
    )
    .bind(user_id)
    .bind(document_id)
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(status)
}

pub async fn fetch_completion(
    pool: &SqlitePool,
    user_id: i64,
    document_id: i64,
) -> sqlx::Result<Option<CompletionRow>> {
    sqlx::query_as::<_, CompletionRow>(
        "SELECT status, completed_at
         FROM training_completions WHERE user_id = ? AND document_id = ?",
    )
    .bind(user_id)
    .bind(document_id)
    .fetch_optional(pool)
    .await
}
