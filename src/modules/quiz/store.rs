use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::grading::{self, QuizStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuizQuestion {
    pub id: i64,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub correct_answer: String,
}

impl QuizQuestion {
    /// Options in display order, skipping the optional ones left blank.
    pub fn options(&self) -> Vec<&str> {
        [
            Some(self.option_a.as_str()),
            Some(self.option_b.as_str()),
            self.option_c.as_deref(),
            self.option_d.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// A validated question ready for insertion; `options` holds two to four entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// One answer read from the quiz form, paired with the stored correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub quiz_id: i64,
    pub question: String,
    pub selected_answer: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question: String,
    pub selected_answer: String,
    pub status: QuizStatus,
}

/// Inserts the whole batch or nothing.
pub async fn insert_questions(
    pool: &SqlitePool,
    document_id: i64,
    questions: &[NewQuestion],
) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    for question in questions {
        let option = |idx: usize| question.options.get(idx).map(String::as_str);
        sqlx::query(
            "INSERT INTO quizzes (document_id, question, option_a, option_b, option_c, option_d, correct_answer, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(&question.question)
        .bind(option(0).unwrap_or_default())
        .bind(option(1).unwrap_or_default())
        .bind(option(2))
        .bind(option(3))
        .bind(&question.correct_answer)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(questions.len())
}

pub async fn fetch_questions(pool: &SqlitePool, document_id: i64) -> sqlx::Result<Vec<QuizQuestion>> {
    sqlx::query_as::<_, QuizQuestion>(
        "SELECT id, question, option_a, option_b, option_c, option_d, correct_answer
         FROM quizzes WHERE document_id = ? ORDER BY id",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await
}

/// The earliest question of a document doubles as its training comprehension check.
pub async fn fetch_check_question(
    pool: &SqlitePool,
    document_id: i64,
) -> sqlx::Result<Option<QuizQuestion>> {
    sqlx::query_as::<_, QuizQuestion>(
        "SELECT id, question, option_a, option_b, option_c, option_d, correct_answer
         FROM quizzes WHERE document_id = ? ORDER BY id LIMIT 1",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await
}

/// Atomic insert-or-overwrite keyed by (quiz_id, user_id).
pub async fn upsert_submission<'e, E>(
    executor: E,
    quiz_id: i64,
    user_id: i64,
    selected_answer: &str,
    status: QuizStatus,
) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO quiz_submissions (quiz_id, user_id, selected_answer, status, submitted_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (quiz_id, user_id) DO UPDATE SET
             selected_answer = excluded.selected_answer,
             status = excluded.status,
             submitted_at = excluded.submitted_at",
    )
    .bind(quiz_id)
    .bind(user_id)
    .bind(selected_answer)
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Grades one answer and records it, replacing any earlier attempt by the same user.
pub async fn grade_submission<'e, E>(
    executor: E,
    quiz_id: i64,
    user_id: i64,
    selected_answer: &str,
    correct_answer: &str,
) -> sqlx::Result<QuizStatus>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status = grading::grade_quiz_answer(selected_answer, correct_answer);
    upsert_submission(executor, quiz_id, user_id, selected_answer, status).await?;
    Ok(status)
}

/// Grades and records a full set of answers in one transaction.
pub async fn record_quiz_submission(
    pool: &SqlitePool,
    user_id: i64,
    answers: &[SubmittedAnswer],
) -> sqlx::Result<Vec<GradedAnswer>> {
    let mut tx = pool.begin().await?;
    let mut graded = Vec::with_capacity(answers.len());
    for answer in answers {
        let status = grade_submission(
            &mut *tx,
            answer.quiz_id,
            user_id,
            &answer.selected_answer,
            &answer.correct_answer,
        )
        .await?;
        graded.push(GradedAnswer {
            question: answer.question.clone(),
            selected_answer: answer.selected_answer.clone(),
            status,
        });
    }
    tx.commit().await?;
    Ok(graded)
}
