use std::borrow::Cow;

use axum::{extract::Query, response::Html};

use crate::web::{
    CurrentUser, FlashQuery, PageLayout, Role, compose_flash_message, escape_html, render_page,
};

pub async fn landing_page(user: CurrentUser, Query(params): Query<FlashQuery>) -> Html<String> {
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Html(render_main_page(&user, &flash))
}

fn render_main_page(user: &CurrentUser, flash: &str) -> String {
    let contact = |value: &Option<String>| {
        value
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "—".to_string())
    };

    let mut cards = vec![(
        "Documents",
        "Browse training documents, download them and start quizzes or training checks.",
        "/documents",
    )];
    if user.role.can_manage_content() {
        cards.push((
            "Upload & author",
            "Upload new documents from the documents page and add quiz questions to them.",
            "/documents#upload",
        ));
    }
    if user.role == Role::Admin {
        cards.push((
            "Dashboard",
            "Review quiz attempts and training completion across all users.",
            "/dashboard",
        ));
    }

    let card_html = cards
        .iter()
        .map(|(title, description, href)| {
            format!(
                r#"<a class="panel" style="display:block;text-decoration:none;color:inherit" href="{href}"><h2>{title}</h2><p class="note">{description}</p></a>"#
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <section class="panel">
            <h2>Welcome, {username}</h2>
            <table>
                <tr><th>Role</th><td>{role}</td></tr>
                <tr><th>Email</th><td>{email}</td></tr>
                <tr><th>Phone</th><td>{phone}</td></tr>
            </table>
        </section>
        <section>{card_html}</section>"#,
        username = escape_html(&user.username),
        role = user.role.label(),
        email = contact(&user.email),
        phone = contact(&user.phone),
    );

    render_page(PageLayout {
        title: "Home",
        user: Some(user),
        flash_html: Cow::Borrowed(flash),
        body_html: Cow::Owned(body),
    })
}
