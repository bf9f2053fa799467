use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub uploaded_by: i64,
    pub upload_date: DateTime<Utc>,
}

/// One line of the documents page, from the viewer's perspective.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentListing {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub uploader: String,
    pub upload_date: DateTime<Utc>,
    pub question_count: i64,
    pub training_status: Option<String>,
}

pub async fn insert_document(
    pool: &SqlitePool,
    title: &str,
    filename: &str,
    uploaded_by: i64,
) -> sqlx::Result<DocumentRow> {
    let upload_date = Utc::now();
    let result = sqlx::query(
        "INSERT INTO documents (title, filename, uploaded_by, upload_date) VALUES (?, ?, ?, ?)",
    )
    .bind(title)
    .bind(filename)
    .bind(uploaded_by)
    .bind(upload_date)
    .execute(pool)
    .await?;

    Ok(DocumentRow {
        id: result.last_insert_rowid(),
        title: title.to_string(),
        filename: filename.to_string(),
        uploaded_by,
        upload_date,
    })
}

pub async fn fetch_document(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(
        "SELECT id, title, filename, uploaded_by, upload_date FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_document_by_filename(
    pool: &SqlitePool,
    filename: &str,
) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(
        "SELECT id, title, filename, uploaded_by, upload_date FROM documents WHERE filename = ?",
    )
    .bind(filename)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_document_listings(
    pool: &SqlitePool,
    viewer_id: i64,
) -> sqlx::Result<Vec<DocumentListing>> {
    sqlx::query_as::<_, DocumentListing>(
        "SELECT documents.id, documents.title, documents.filename,
                users.username AS uploader, documents.upload_date,
                (SELECT COUNT(*) FROM quizzes WHERE quizzes.document_id = documents.id) AS question_count,
                training_completions.status AS training_status
         FROM documents
         JOIN users ON users.id = documents.uploaded_by
         LEFT JOIN training_completions
                ON training_completions.document_id = documents.id
               AND training_completions.user_id = ?
         ORDER BY documents.upload_date DESC, documents.id DESC",
    )
    .bind(viewer_id)
    .fetch_all(pool)
    .await
}
