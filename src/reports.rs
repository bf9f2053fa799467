use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use sqlx::SqlitePool;

/// Attempts for one document, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentGroup<T> {
    pub document_id: i64,
    pub title: String,
    pub attempts: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizAttempt {
    pub username: String,
    pub question: String,
    pub selected_answer: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionAttempt {
    pub username: String,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct QuizAttemptRow {
    document_id: i64,
    title: String,
    username: String,
    question: String,
    selected_answer: String,
    status: String,
    submitted_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CompletionRow {
    document_id: i64,
    title: String,
    username: String,
    status: String,
    completed_at: DateTime<Utc>,
}

/// Groups already-ordered rows by document id. Groups keep the order in which
/// their document first appears; rows keep their relative order inside a group.
pub fn group_by_document<T>(rows: impl IntoIterator<Item = (i64, String, T)>) -> Vec<DocumentGroup<T>> {
    let mut groups: Vec<DocumentGroup<T>> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for (document_id, title, attempt) in rows {
        let position = *positions.entry(document_id).or_insert_with(|| {
            groups.push(DocumentGroup {
                document_id,
                title,
                attempts: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].attempts.push(attempt);
    }

    groups
}

pub async fn build_admin_summary(pool: &SqlitePool) -> sqlx::Result<Vec<DocumentGroup<QuizAttempt>>> {
    let rows = sqlx::query_as::<_, QuizAttemptRow>(
        "SELECT documents.id AS document_id, documents.title, users.username,
                quizzes.question, quiz_submissions.selected_answer,
                quiz_submissions.status, quiz_submissions.submitted_at
         FROM quiz_submissions
         JOIN quizzes ON quizzes.id = quiz_submissions.quiz_id
         JOIN documents ON documents.id = quizzes.document_id
         JOIN users ON users.id = quiz_submissions.user_id
         ORDER BY quiz_submissions.submitted_at DESC, quiz_submissions.id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(group_by_document(rows.into_iter().map(|row| {
        (
            row.document_id,
            row.title,
            QuizAttempt {
                username: row.username,
                question: row.question,
                selected_answer: row.selected_answer,
                status: row.status,
                submitted_at: row.submitted_at,
            },
        )
    })))
}

pub async fn build_completion_summary(
    pool: &SqlitePool,
) -> sqlx::Result<Vec<DocumentGroup<CompletionAttempt>>> {
    let rows = sqlx::query_as::<_, CompletionRow>(
        "SELECT documents.id AS document_id, documents.title, users.username,
                training_completions.status, training_completions.completed_at
         FROM training_completions
         JOIN documents ON documents.id = training_completions.document_id
         JOIN users ON users.id = training_completions.user_id
         ORDER BY training_completions.completed_at DESC, training_completions.id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(group_by_document(rows.into_iter().map(|row| {
        (
            row.document_id,
            row.title,
            CompletionAttempt {
                username: row.username,
                status: row.status,
                completed_at: row.completed_at,
            },
        )
    })))
}

const SUMMARY_HEADERS: [&str; 7] = [
    "Document ID",
    "Document",
    "Username",
    "Question",
    "Answer",
    "Status",
    "Submitted at",
];

/// One worksheet row per quiz attempt, in summary order.
pub fn summary_workbook(groups: &[DocumentGroup<QuizAttempt>]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Quiz summary")
        .context("failed to name worksheet")?;

    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .context("failed to write header row")?;
    }

    let mut row = 1_u32;
    for group in groups {
        for attempt in &group.attempts {
            worksheet
                .write_number(row, 0, group.document_id as f64)
                .context("failed to write document id")?;
            let cells = [
                group.title.as_str(),
                attempt.username.as_str(),
                attempt.question.as_str(),
                attempt.selected_answer.as_str(),
                attempt.status.as_str(),
            ];
            for (offset, value) in cells.iter().enumerate() {
                worksheet
                    .write_string(row, (offset + 1) as u16, *value)
                    .context("failed to write summary cell")?;
            }
            worksheet
                .write_string(row, 6, attempt.submitted_at.to_rfc3339())
                .context("failed to write submission time")?;
            row += 1;
        }
    }

    workbook
        .save_to_buffer()
        .context("failed to serialise summary workbook")
}
