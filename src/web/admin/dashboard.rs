use std::borrow::Cow;

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::error;

use crate::{
    reports::{self, CompletionAttempt, DocumentGroup, QuizAttempt},
    web::{
        AppState, CurrentUser, FlashQuery, PageLayout, Role, compose_flash_message, escape_html,
        render_page, render_status_tag, templates::format_timestamp,
    },
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DashboardUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn fetch_dashboard_users(pool: &SqlitePool) -> sqlx::Result<Vec<DashboardUser>> {
    sqlx::query_as::<_, DashboardUser>(
        "SELECT id, username, role, email, phone, created_at FROM users ORDER BY username",
    )
    .fetch_all(pool)
    .await
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    user.require_admin()?;

    let pool = state.pool_ref();
    let users = fetch_dashboard_users(pool).await.map_err(|err| {
        error!(?err, "failed to load dashboard users");
        Redirect::to("/?error=unknown")
    })?;
    let quiz_summary = reports::build_admin_summary(pool).await.map_err(|err| {
        error!(?err, "failed to build quiz summary");
        Redirect::to("/?error=unknown")
    })?;
    let completion_summary = reports::build_completion_summary(pool)
        .await
        .map_err(|err| {
            error!(?err, "failed to build completion summary");
            Redirect::to("/?error=unknown")
        })?;

    let body = format!(
        r#"        <section class="panel">
            <h2>Users</h2>
            <table>
                <tr><th>Username</th><th>Role</th><th>Email</th><th>Phone</th><th>Registered</th></tr>
                {user_rows}
            </table>
        </section>
        <section class="panel">
            <h2>Quiz results</h2>
            <p class="note">Download: <a href="/dashboard/summary.xlsx">Excel</a> · <a href="/dashboard/summary.json">JSON</a></p>
            {quiz_html}
        </section>
        <section class="panel">
            <h2>Training completions</h2>
            {completion_html}
        </section>"#,
        user_rows = render_user_rows(&users, user.id),
        quiz_html = render_quiz_summary(&quiz_summary),
        completion_html = render_completion_summary(&completion_summary),
    );

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_page(PageLayout {
        title: "Admin dashboard",
        user: Some(&user),
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
    })))
}

fn render_user_rows(users: &[DashboardUser], current_id: i64) -> String {
    if users.is_empty() {
        return r#"<tr><td colspan="5">No users yet.</td></tr>"#.to_string();
    }

    users
        .iter()
        .map(|row| {
            let role = Role::parse(&row.role)
                .map(Role::label)
                .unwrap_or(row.role.as_str());
            let marker = if row.id == current_id { " (you)" } else { "" };
            format!(
                "<tr><td>{name}{marker}</td><td>{role}</td><td>{email}</td><td>{phone}</td><td>{created}</td></tr>",
                name = escape_html(&row.username),
                role = escape_html(role),
                email = escape_html(row.email.as_deref().unwrap_or("")),
                phone = escape_html(row.phone.as_deref().unwrap_or("")),
                created = format_timestamp(&row.created_at),
            )
        })
        .collect()
}

fn render_group_heading<T>(group: &DocumentGroup<T>) -> String {
    format!(
        "<h3>{title} <span class=\"note\">#{id}</span></h3>",
        title = escape_html(&group.title),
        id = group.document_id,
    )
}

fn render_quiz_summary(groups: &[DocumentGroup<QuizAttempt>]) -> String {
    if groups.is_empty() {
        return r#"<p class="note">No quiz answers have been submitted yet.</p>"#.to_string();
    }

    groups
        .iter()
        .map(|group| {
            let rows = group
                .attempts
                .iter()
                .map(|attempt| {
                    format!(
                        "<tr><td>{user}</td><td>{question}</td><td>{answer}</td><td>{status}</td><td>{at}</td></tr>",
                        user = escape_html(&attempt.username),
                        question = escape_html(&attempt.question),
                        answer = escape_html(&attempt.selected_answer),
                        status = render_status_tag(&attempt.status),
                        at = format_timestamp(&attempt.submitted_at),
                    )
                })
                .collect::<String>();
            format!(
                "{heading}<table><tr><th>User</th><th>Question</th><th>Answer</th><th>Status</th><th>Submitted</th></tr>{rows}</table>",
                heading = render_group_heading(group),
            )
        })
        .collect()
}

fn render_completion_summary(groups: &[DocumentGroup<CompletionAttempt>]) -> String {
    if groups.is_empty() {
        return r#"<p class="note">Nobody has started a training yet.</p>"#.to_string();
    }

    groups
        .iter()
        .map(|group| {
            let rows = group
                .attempts
                .iter()
                .map(|attempt| {
                    format!(
                        "<tr><td>{user}</td><td>{status}</td><td>{at}</td></tr>",
                        user = escape_html(&attempt.username),
                        status = render_status_tag(&attempt.status),
                        at = format_timestamp(&attempt.completed_at),
                    )
                })
                .collect::<String>();
            format!(
                "{heading}<table><tr><th>User</th><th>Status</th><th>Updated</th></tr>{rows}</table>",
                heading = render_group_heading(group),
            )
        })
        .collect()
}
