use std::borrow::Cow;

use chrono::{DateTime, Datelike, Utc};

use crate::web::auth::{CurrentUser, Role};

const APP_TITLE: &str = "Training Portal";

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.6rem; }
        nav { display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
        nav a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        nav a:hover { background: #bfdbfe; }
        nav .who { color: #475569; font-size: 0.95rem; }
        main { padding: 2rem 1.5rem; max-width: 960px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2.5rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 1.5rem; }
        .panel h2 { margin-top: 0; }
        label { display: block; margin: 0.75rem 0 0.4rem; font-weight: 600; }
        input[type="text"], input[type="password"], input[type="email"], input[type="tel"], input[type="file"], select, textarea { width: 100%; padding: 0.7rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; font-size: 1rem; }
        button { margin-top: 1rem; padding: 0.75rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; }
        th, td { padding: 0.65rem 0.85rem; border: 1px solid #e2e8f0; text-align: left; font-size: 0.95rem; }
        th { background: #f1f5f9; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.info { background: #eff6ff; border-color: #bfdbfe; color: #1d4ed8; }
        .flash.warning { background: #fffbeb; border-color: #fde68a; color: #92400e; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .status-tag { display: inline-flex; padding: 0.2rem 0.7rem; border-radius: 999px; font-size: 0.85rem; font-weight: 600; }
        .status-tag.pending { background: #fef3c7; color: #92400e; }
        .status-tag.completed { background: #dcfce7; color: #166534; }
        .status-tag.failed, .status-tag.re-take { background: #fee2e2; color: #b91c1c; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .preview { white-space: pre-wrap; background: #f1f5f9; border-radius: 8px; padding: 1rem; max-height: 24rem; overflow-y: auto; font-size: 0.92rem; }
        .question { border-top: 1px solid #e2e8f0; padding-top: 1rem; margin-top: 1rem; }
        .question label.option { font-weight: 400; display: flex; gap: 0.5rem; align-items: center; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
        }
"#;

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub user: Option<&'a CurrentUser>,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        user,
        flash_html,
        body_html,
    } = layout;

    let nav_html = user.map(render_nav).unwrap_or_default();
    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · {app}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{title}</h1>
            {nav_html}
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        app = APP_TITLE,
        styles = PAGE_BASE_STYLES,
        nav_html = nav_html,
        flash_html = flash_html,
        body_html = body_html,
        footer = footer,
    )
}

fn render_nav(user: &CurrentUser) -> String {
    let dashboard_link = if user.role == Role::Admin {
        r#"<a href="/dashboard">Dashboard</a>"#
    } else {
        ""
    };

    format!(
        r#"<nav>
                <span class="who">Signed in as <strong>{username}</strong> ({role})</span>
                <a href="/">Home</a>
                <a href="/documents">Documents</a>
                {dashboard_link}
                <a href="/logout">Logout</a>
            </nav>"#,
        username = escape_html(&user.username),
        role = user.role.label(),
        dashboard_link = dashboard_link,
    )
}

pub fn render_login_page(flash_html: &str) -> String {
    let body = r#"        <section class="panel">
            <h2>Login</h2>
            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Login</button>
            </form>
            <p class="note">No account yet? <a href="/register">Register here</a>.</p>
        </section>"#;

    render_page(PageLayout {
        title: "Login",
        user: None,
        flash_html: Cow::Borrowed(flash_html),
        body_html: Cow::Borrowed(body),
    })
}

pub fn render_register_page(flash_html: &str, roles: &[Role]) -> String {
    let role_options = roles
        .iter()
        .map(|role| {
            format!(
                r#"<option value="{value}">{label}</option>"#,
                value = role.as_str(),
                label = role.label()
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <section class="panel">
            <h2>Create an account</h2>
            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <label for="role">Account type</label>
                <select id="role" name="role" required>{role_options}</select>
                <label for="email">Email (optional)</label>
                <input id="email" type="email" name="email">
                <label for="phone">Phone number (optional)</label>
                <input id="phone" type="tel" name="phone">
                <button type="submit">Register</button>
            </form>
            <p class="note">Already registered? <a href="/login">Login</a>.</p>
        </section>"#
    );

    render_page(PageLayout {
        title: "Register",
        user: None,
        flash_html: Cow::Borrowed(flash_html),
        body_html: Cow::Owned(body),
    })
}

pub fn render_status_tag(status: &str) -> String {
    let class = escape_html(status);
    format!(r#"<span class="status-tag {class}">{class}</span>"#)
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {app}</footer>"#,
        year = current_year,
        app = APP_TITLE,
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralises_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn dashboard_link_only_for_admins() {
        let mut user = CurrentUser {
            id: 1,
            username: "<b>kim</b>".to_string(),
            role: Role::Student,
            email: None,
            phone: None,
        };
        let student_nav = render_nav(&user);
        assert!(!student_nav.contains("/dashboard"));
        assert!(student_nav.contains("&lt;b&gt;kim&lt;/b&gt;"));

        user.role = Role::Admin;
        assert!(render_nav(&user).contains("/dashboard"));
    }
}
