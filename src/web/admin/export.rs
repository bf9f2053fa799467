use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tracing::error;

use crate::{
    reports::{self, CompletionAttempt, DocumentGroup, QuizAttempt},
    web::{AppState, CurrentUser},
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Serialize)]
pub struct SummaryExport {
    pub quizzes: Vec<DocumentGroup<QuizAttempt>>,
    pub completions: Vec<DocumentGroup<CompletionAttempt>>,
}

pub async fn summary_json(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SummaryExport>, Redirect> {
    user.require_admin()?;

    let pool = state.pool_ref();
    let quizzes = reports::build_admin_summary(pool).await.map_err(|err| {
        error!(?err, "failed to build quiz summary for export");
        Redirect::to("/dashboard?error=unknown")
    })?;
    let completions = reports::build_completion_summary(pool)
        .await
        .map_err(|err| {
            error!(?err, "failed to build completion summary for export");
            Redirect::to("/dashboard?error=unknown")
        })?;

    Ok(Json(SummaryExport {
        quizzes,
        completions,
    }))
}

pub async fn summary_xlsx(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, Redirect> {
    user.require_admin()?;

    let groups = reports::build_admin_summary(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to build quiz summary for export");
            Redirect::to("/dashboard?error=unknown")
        })?;

    let workbook = tokio::task::spawn_blocking(move || reports::summary_workbook(&groups)).await;
    let bytes = match workbook {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(err)) => {
            error!(?err, "failed to generate summary workbook");
            return Ok(export_failed());
        }
        Err(err) => {
            error!(?err, "summary workbook task panicked");
            return Ok(export_failed());
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"quiz-summary.xlsx\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

fn export_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>Export failed</h1><p>Please try again later.</p>".to_string()),
    )
        .into_response()
}
