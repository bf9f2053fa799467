use std::borrow::Cow;

use axum::{
    Router,
    extract::{Form, Path, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{error, info, warn};

pub mod store;

use crate::{
    grading::TrainingStatus,
    modules::{
        documents::{DocumentRow, fetch_document},
        quiz::store::fetch_check_question,
    },
    utils::text_extract::document_preview,
    web::{
        AppState, CurrentUser, FlashQuery, PageLayout, compose_flash_message, escape_html,
        render_page, render_status_tag,
        storage::download_href,
        templates::format_timestamp,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/start_training/:doc_id",
            get(training_page).post(submit_training),
        )
        .route("/submit_training/:doc_id", post(submit_training))
        .route("/complete_training/:doc_id", post(submit_training))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainingForm {
    #[serde(default)]
    pub answer: String,
}

async fn load_document(state: &AppState, doc_id: i64) -> Result<DocumentRow, Redirect> {
    match fetch_document(state.pool_ref(), doc_id).await {
        Ok(Some(document)) => Ok(document),
        Ok(None) => Err(Redirect::to("/documents?error=document_not_found")),
        Err(err) => {
            error!(?err, doc_id, "failed to load document");
            Err(Redirect::to("/documents?error=unknown"))
        }
    }
}

async fn training_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    let document = load_document(&state, doc_id).await?;
    let pool = state.pool_ref();

    if let Err(err) = store::mark_started(pool, user.id, doc_id).await {
        error!(?err, doc_id, user_id = user.id, "failed to record training start");
    }

    let status_html = match store::fetch_completion(pool, user.id, doc_id).await {
        Ok(Some(row)) => format!(
            r#"{tag} <span class="note">(updated {at})</span>"#,
            tag = render_status_tag(
                row.training_status()
                    .unwrap_or(TrainingStatus::Pending)
                    .as_str()
            ),
            at = format_timestamp(&row.completed_at),
        ),
        Ok(None) => render_status_tag(TrainingStatus::Pending.as_str()),
        Err(err) => {
            error!(?err, doc_id, user_id = user.id, "failed to load training status");
            String::new()
        }
    };

    let preview_html = match document_preview(state.upload_dir().join(&document.filename)).await {
        Ok(text) if !text.trim().is_empty() => {
            format!(r#"<div class="preview">{}</div>"#, escape_html(&text))
        }
        Ok(_) => r#"<p class="note">This document has no readable text.</p>"#.to_string(),
        Err(err) => {
            warn!(?err, doc_id, "document preview unavailable");
            r#"<p class="note">A preview is not available for this document.</p>"#.to_string()
        }
    };

    let check = fetch_check_question(pool, doc_id).await.map_err(|err| {
        error!(?err, doc_id, "failed to load training check");
        Redirect::to("/documents?error=unknown")
    })?;

    let check_html = match check {
        Some(question) => {
            let options = question
                .options()
                .into_iter()
                .map(|option| {
                    format!(
                        r#"<label class="option"><input type="radio" name="answer" value="{value}" required> {value}</label>"#,
                        value = escape_html(option),
                    )
                })
                .collect::<String>();
            format!(
                r#"<form method="post" action="/complete_training/{doc_id}">
                <div class="question"><p><strong>{text}</strong></p>{options}</div>
                <button type="submit">Complete training</button>
            </form>"#,
                text = escape_html(&question.question),
            )
        }
        None => r#"<p class="note">No comprehension check has been set up for this document yet.</p>"#
            .to_string(),
    };

    let body = format!(
        r#"        <section class="panel">
            <p>Your status: {status_html}</p>
            <p><a href="{href}">Download the full document</a></p>
            {preview_html}
        </section>
        <section class="panel">
            <h2>Comprehension check</h2>
            {check_html}
        </section>"#,
        href = escape_html(&download_href(&document.filename)),
    );

    let title = format!("Training: {}", document.title);
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_page(PageLayout {
        title: &title,
        user: Some(&user),
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
    })))
}

async fn submit_training(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Form(form): Form<TrainingForm>,
) -> Redirect {
    if let Err(redirect) = load_document(&state, doc_id).await {
        return redirect;
    }

    let answer = form.answer.trim();
    if answer.is_empty() {
        return Redirect::to(&format!("/start_training/{doc_id}?error=missing_answer"));
    }

    let check = match fetch_check_question(state.pool_ref(), doc_id).await {
        Ok(Some(check)) => check,
        Ok(None) => {
            warn!(doc_id, user_id = user.id, "training submitted without a check question");
            return Redirect::to(&format!("/start_training/{doc_id}?error=no_training_check"));
        }
        Err(err) => {
            error!(?err, doc_id, "failed to load training check");
            return Redirect::to(&format!("/start_training/{doc_id}?error=unknown"));
        }
    };

    match store::record_attempt(
        state.pool_ref(),
        user.id,
        doc_id,
        answer,
        &check.correct_answer,
    )
    .await
    {
        Ok(status) => {
            info!(doc_id, user_id = user.id, status = status.as_str(), "training attempt recorded");
            let code = match status {
                TrainingStatus::Completed => "training_completed",
                _ => "training_retake",
            };
            Redirect::to(&format!("/start_training/{doc_id}?status={code}"))
        }
        Err(err) => {
            error!(?err, doc_id, user_id = user.id, "failed to record training attempt");
            Redirect::to(&format!("/start_training/{doc_id}?error=unknown"))
        }
    }
}
