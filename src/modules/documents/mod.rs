use std::{borrow::Cow, path::Path};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

pub mod store;

use crate::web::{
    AppState, CurrentUser, FlashQuery, PageLayout, Role, compose_flash_message, escape_html,
    render_page, render_status_tag,
    storage::{content_type_for, download_href, stream_file},
    templates::format_timestamp,
    uploads::{
        ReceivedFile, UploadError, file_extension, persist_upload, read_upload_form,
        sanitize_upload_name,
    },
};

pub use store::{DocumentRow, fetch_document};

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx", "txt"];
const FILE_FIELD: &str = "file";
const TITLE_FIELD: &str = "title";
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", get(documents_page))
        .route(
            "/upload",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/download/:filename", get(download_document))
}

/// Why an upload was refused before anything was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    AccessDenied,
    MissingTitle,
    MissingFile,
    DisallowedExtension(String),
    InvalidFilename,
}

impl UploadRejection {
    pub fn code(&self) -> &'static str {
        match self {
            UploadRejection::AccessDenied => "access_denied",
            UploadRejection::MissingTitle => "missing_title",
            UploadRejection::MissingFile => "missing_file",
            UploadRejection::DisallowedExtension(_) => "invalid_extension",
            UploadRejection::InvalidFilename => "invalid_filename",
        }
    }
}

impl std::fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadRejection::AccessDenied => write!(f, "only admins and trainers may upload"),
            UploadRejection::MissingTitle => write!(f, "document title is required"),
            UploadRejection::MissingFile => write!(f, "a file is required"),
            UploadRejection::DisallowedExtension(ext) => {
                write!(f, "file extension `{ext}` is not allowed")
            }
            UploadRejection::InvalidFilename => write!(f, "file name is not usable"),
        }
    }
}

impl std::error::Error for UploadRejection {}

/// A validated upload: trimmed title plus the sanitized name to store under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub title: String,
    pub sanitized_name: String,
}

/// Pure gate applied to every upload: role, required fields, extension, filename.
pub fn check_upload(
    role: Role,
    title: Option<&str>,
    original_name: Option<&str>,
) -> Result<AcceptedUpload, UploadRejection> {
    if !role.can_manage_content() {
        return Err(UploadRejection::AccessDenied);
    }

    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(UploadRejection::MissingTitle)?;
    let original_name = original_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(UploadRejection::MissingFile)?;

    let extension = file_extension(original_name);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadRejection::DisallowedExtension(extension));
    }

    let sanitized_name = sanitize_upload_name(original_name)
        .filter(|name| file_extension(name) == extension)
        .ok_or(UploadRejection::InvalidFilename)?;

    Ok(AcceptedUpload {
        title: title.to_string(),
        sanitized_name,
    })
}

#[derive(Debug)]
pub enum UploadFailure {
    Rejected(UploadRejection),
    Storage(UploadError),
    Database(sqlx::Error),
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadFailure::Rejected(rejection) => write!(f, "upload rejected: {rejection}"),
            UploadFailure::Storage(err) => write!(f, "failed to store upload: {err}"),
            UploadFailure::Database(err) => write!(f, "failed to record upload: {err}"),
        }
    }
}

impl std::error::Error for UploadFailure {}

/// Validates, writes the file, then records the document. The file is removed
/// again if the row cannot be inserted.
pub async fn accept_upload(
    pool: &SqlitePool,
    upload_dir: &Path,
    uploader: &CurrentUser,
    title: Option<&str>,
    file: Option<&ReceivedFile>,
) -> Result<DocumentRow, UploadFailure> {
    let accepted = check_upload(
        uploader.role,
        title,
        file.map(|file| file.original_name.as_str()),
    )
    .map_err(UploadFailure::Rejected)?;
    let Some(file) = file else {
        return Err(UploadFailure::Rejected(UploadRejection::MissingFile));
    };

    let (stored_name, stored_path) =
        persist_upload(upload_dir, &accepted.sanitized_name, &file.bytes)
            .await
            .map_err(UploadFailure::Storage)?;

    match store::insert_document(pool, &accepted.title, &stored_name, uploader.id).await {
        Ok(document) => Ok(document),
        Err(err) => {
            if let Err(remove_err) = tokio::fs::remove_file(&stored_path).await {
                warn!(?remove_err, file = %stored_path.display(), "failed to remove orphaned upload");
            }
            Err(UploadFailure::Database(err))
        }
    }
}

async fn upload_document(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Redirect {
    if let Err(redirect) = user.require_content_manager() {
        return redirect;
    }

    let form = match read_upload_form(multipart, &[FILE_FIELD]).await {
        Ok(form) => form,
        Err(err) => {
            warn!(error = %err, user_id = user.id, "failed to read upload form");
            return Redirect::to("/documents?error=upload_failed");
        }
    };

    let result = accept_upload(
        state.pool_ref(),
        state.upload_dir(),
        &user,
        form.first_text(TITLE_FIELD),
        form.first_file_for(FILE_FIELD),
    )
    .await;

    match result {
        Ok(document) => {
            info!(
                document_id = document.id,
                filename = %document.filename,
                user_id = user.id,
                "document uploaded"
            );
            Redirect::to("/documents?status=uploaded")
        }
        Err(UploadFailure::Rejected(rejection)) => {
            warn!(%rejection, user_id = user.id, "upload rejected");
            Redirect::to(&format!("/documents?error={}", rejection.code()))
        }
        Err(err) => {
            error!(?err, "failed to store uploaded document");
            Redirect::to("/documents?error=upload_failed")
        }
    }
}

async fn documents_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    let listings = store::fetch_document_listings(state.pool_ref(), user.id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load documents");
            Redirect::to("/?error=unknown")
        })?;

    let manager = user.role.can_manage_content();
    let rows = if listings.is_empty() {
        r#"<tr><td colspan="5">No documents have been uploaded yet.</td></tr>"#.to_string()
    } else {
        listings
            .iter()
            .map(|doc| {
                let mut actions = vec![
                    format!(
                        r#"<a href="{href}">Download</a>"#,
                        href = escape_html(&download_href(&doc.filename))
                    ),
                    format!(r#"<a href="/start_training/{id}">Training</a>"#, id = doc.id),
                ];
                if doc.question_count > 0 {
                    actions.push(format!(
                        r#"<a href="/start_quiz/{id}">Quiz ({count})</a>"#,
                        id = doc.id,
                        count = doc.question_count
                    ));
                }
                if manager {
                    actions.push(format!(
                        r#"<a href="/add_quiz/{id}">Add questions</a>"#,
                        id = doc.id
                    ));
                }
                let status = doc
                    .training_status
                    .as_deref()
                    .map(render_status_tag)
                    .unwrap_or_else(|| "—".to_string());

                format!(
                    "<tr><td>{title}</td><td>{uploader}</td><td>{date}</td><td>{status}</td><td>{actions}</td></tr>",
                    title = escape_html(&doc.title),
                    uploader = escape_html(&doc.uploader),
                    date = format_timestamp(&doc.upload_date),
                    status = status,
                    actions = actions.join(" · "),
                )
            })
            .collect::<String>()
    };

    let upload_panel = if manager {
        format!(
            r#"        <section class="panel" id="upload">
            <h2>Upload a document</h2>
            <form method="post" action="/upload" enctype="multipart/form-data">
                <label for="title">Title</label>
                <input id="title" type="text" name="{title_field}" required>
                <label for="file">File</label>
                <input id="file" type="file" name="{file_field}" accept=".pdf,.docx,.pptx,.txt" required>
                <p class="note">Allowed types: PDF, DOCX, PPTX, TXT.</p>
                <button type="submit">Upload</button>
            </form>
        </section>"#,
            title_field = TITLE_FIELD,
            file_field = FILE_FIELD,
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"{upload_panel}
        <section class="panel">
            <h2>Documents</h2>
            <table>
                <tr><th>Title</th><th>Uploaded by</th><th>Date</th><th>My training</th><th>Actions</th></tr>
                {rows}
            </table>
        </section>"#
    );

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_page(PageLayout {
        title: "Documents",
        user: Some(&user),
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
    })))
}

async fn download_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    if sanitize_upload_name(&filename).as_deref() != Some(filename.as_str()) {
        warn!(%filename, "rejected download with unsafe filename");
        return not_found();
    }

    match store::fetch_document_by_filename(state.pool_ref(), &filename).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(err) => {
            error!(?err, "failed to look up document for download");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>Server error</h1><p>Please try again later.</p>".to_string()),
            )
                .into_response();
        }
    }

    let path = state.upload_dir().join(&filename);
    match stream_file(&path, &filename, &content_type_for(&filename)).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<h1>Not found</h1><p>The requested document does not exist.</p>".to_string()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::register::{NewUser, insert_user};
    use axum::body::Bytes;

    #[test]
    fn students_cannot_upload() {
        assert_eq!(
            check_upload(Role::Student, Some("Notes"), Some("notes.pdf")),
            Err(UploadRejection::AccessDenied)
        );
    }

    #[test]
    fn title_and_file_are_required() {
        assert_eq!(
            check_upload(Role::Trainer, Some("   "), Some("notes.pdf")),
            Err(UploadRejection::MissingTitle)
        );
        assert_eq!(
            check_upload(Role::Trainer, Some("Notes"), None),
            Err(UploadRejection::MissingFile)
        );
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert_eq!(
            check_upload(Role::Admin, Some("Bad"), Some("payload.exe")),
            Err(UploadRejection::DisallowedExtension("exe".to_string()))
        );
        let accepted = check_upload(Role::Admin, Some(" Deck "), Some("Intro.PPTX")).unwrap();
        assert_eq!(accepted.title, "Deck");
        assert_eq!(accepted.sanitized_name, "Intro.PPTX");
    }

    #[test]
    fn traversal_names_are_flattened() {
        let accepted = check_upload(Role::Trainer, Some("Doc"), Some("../../secret.txt")).unwrap();
        assert!(!accepted.sanitized_name.contains('/'));
        assert!(accepted.sanitized_name.ends_with("secret.txt"));
    }

    #[tokio::test]
    async fn accepted_upload_is_written_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join("uploads");
        let state = AppState::in_memory(&upload_dir).await;
        let trainer_id = insert_user(
            state.pool_ref(),
            NewUser {
                username: "tina",
                password: "pw",
                role: Role::Trainer,
                email: None,
                phone: None,
            },
        )
        .await
        .unwrap();
        let trainer = CurrentUser {
            id: trainer_id,
            username: "tina".to_string(),
            role: Role::Trainer,
            email: None,
            phone: None,
        };
        let file = ReceivedFile {
            field_name: FILE_FIELD.to_string(),
            original_name: "notes.pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        };

        let document = accept_upload(
            state.pool_ref(),
            state.upload_dir(),
            &trainer,
            Some("Safety notes"),
            Some(&file),
        )
        .await
        .unwrap();

        assert_eq!(document.filename, "notes.pdf");
        assert_eq!(document.uploaded_by, trainer_id);
        assert!(upload_dir.join("notes.pdf").exists());

        let stored = fetch_document(state.pool_ref(), document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Safety notes");

        let exe = ReceivedFile {
            original_name: "payload.exe".to_string(),
            ..file
        };
        let err = accept_upload(
            state.pool_ref(),
            state.upload_dir(),
            &trainer,
            Some("Bad"),
            Some(&exe),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            UploadFailure::Rejected(UploadRejection::DisallowedExtension(_))
        ));
        assert!(!upload_dir.join("payload.exe").exists());
    }
}
