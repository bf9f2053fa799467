use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};

use crate::{
    modules,
    web::{AppState, admin, auth, landing, register},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::landing_page))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(register::register_page).post(register::process_register),
        )
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/dashboard", get(admin::dashboard))
        .route("/dashboard/summary.json", get(admin::summary_json))
        .route("/dashboard/summary.xlsx", get(admin::summary_xlsx))
        .merge(modules::documents::router())
        .merge(modules::quiz::router())
        .merge(modules::training::router())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::{
        Role,
        auth::SESSION_COOKIE,
        register::{NewUser, insert_user},
    };
    use axum::{
        body::Body,
        http::{Request, Response, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XTRAININGBOUNDARY";

    async fn spawn_app() -> (tempfile::TempDir, AppState, Router) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::in_memory(&dir.path().join("uploads")).await;
        state.ensure_seed_admin().await.unwrap();
        let app = build_router(state.clone());
        (dir, state, app)
    }

    async fn add_user(state: &AppState, username: &str, role: Role) {
        insert_user(
            state.pool_ref(),
            NewUser {
                username,
                password: "pw",
                role,
                email: None,
                phone: None,
            },
        )
        .await
        .unwrap();
    }

    fn location(response: &Response<Body>) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_post_with_cookie(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(form_post(
                "/login",
                &format!("username={username}&password={password}"),
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/?status=logged_in");

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();
        assert!(pair.starts_with(SESSION_COOKIE));
        pair
    }

    fn upload_request(cookie: &str, title: &str, filename: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n\
             --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{contents}\r\n--{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn anonymous_visitors_are_sent_to_login() {
        let (_dir, _state, app) = spawn_app().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?status=login_required");

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn registration_then_login_shows_profile() {
        let (_dir, _state, app) = spawn_app().await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/register",
                "username=sam&password=pw&role=student&email=sam%40example.com&phone=",
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/login?status=registered");

        let response = app
            .clone()
            .oneshot(form_post(
                "/register",
                "username=sam&password=other&role=trainer",
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/register?error=duplicate_username");

        let cookie = login(&app, "sam", "pw").await;
        let response = app
            .clone()
            .oneshot(get_with_cookie("/", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("sam@example.com"));
        assert!(html.contains("Student"));

        let response = app
            .clone()
            .oneshot(get_with_cookie("/logout", &cookie))
            .await
            .unwrap();
        assert_eq!(location(&response), "/login?status=logged_out");

        let response = app
            .oneshot(get_with_cookie("/", &cookie))
            .await
            .unwrap();
        assert_eq!(location(&response), "/login?status=login_required");
    }

    #[tokio::test]
    async fn uploads_are_role_gated_and_downloadable() {
        let (dir, state, app) = spawn_app().await;
        add_user(&state, "tina", Role::Trainer).await;
        add_user(&state, "sam", Role::Student).await;
        let trainer = login(&app, "tina", "pw").await;
        let student = login(&app, "sam", "pw").await;

        let response = app
            .clone()
            .oneshot(upload_request(&student, "Notes", "notes.pdf", "%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/?error=access_denied");
        assert!(!dir.path().join("uploads").join("notes.pdf").exists());

        let response = app
            .clone()
            .oneshot(upload_request(&trainer, "Bad", "payload.exe", "MZ"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/documents?error=invalid_extension");

        let response = app
            .clone()
            .oneshot(upload_request(&trainer, "Notes", "notes.pdf", "%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/documents?status=uploaded");

        let response = app
            .clone()
            .oneshot(get_with_cookie("/download/notes.pdf", &student))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.starts_with("attachment"));
        assert_eq!(body_text(response).await, "%PDF-1.4");

        let response = app
            .oneshot(get_with_cookie("/download/payload.exe", &student))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn upload_as(app: &Router, state: &AppState, cookie: &str, filename: &str) -> i64 {
        let response = app
            .clone()
            .oneshot(upload_request(cookie, "Fire drill", filename, "Exit to the left."))
            .await
            .unwrap();
        assert_eq!(location(&response), "/documents?status=uploaded");
        sqlx::query_scalar("SELECT id FROM documents WHERE filename = ?")
            .bind(filename)
            .fetch_one(state.pool_ref())
            .await
            .unwrap()
    }

    async fn count_rows(state: &AppState, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(state.pool_ref())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn listed_download_links_survive_url_syntax_in_names() {
        let (_dir, state, app) = spawn_app().await;
        add_user(&state, "tina", Role::Trainer).await;
        add_user(&state, "sam", Role::Student).await;
        let trainer = login(&app, "tina", "pw").await;
        let student = login(&app, "sam", "pw").await;

        upload_as(&app, &state, &trainer, "report#2.pdf").await;

        let response = app
            .clone()
            .oneshot(get_with_cookie("/documents", &student))
            .await
            .unwrap();
        let html = body_text(response).await;
        let href = html
            .split(r#"href=""#)
            .filter_map(|rest| rest.split('"').next())
            .find(|href| href.starts_with("/download/") && href.contains("report"))
            .unwrap()
            .to_string();
        assert_eq!(href, "/download/report%232.pdf");

        let response = app
            .oneshot(get_with_cookie(&href, &student))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Exit to the left.");
    }

    #[tokio::test]
    async fn quiz_authoring_is_gated_and_submissions_are_all_or_nothing() {
        let (_dir, state, app) = spawn_app().await;
        add_user(&state, "tina", Role::Trainer).await;
        add_user(&state, "sam", Role::Student).await;
        let trainer = login(&app, "tina", "pw").await;
        let student = login(&app, "sam", "pw").await;
        let doc = upload_as(&app, &state, &trainer, "drill.txt").await;

        let batch = "question_1=Which%20way%3F&option_a_1=Left&option_b_1=Right&correct_answer_1=Left\
                     &question_2=Who%20leads%3F&option_a_2=Warden&option_b_2=Nobody&correct_answer_2=Warden";

        let response = app
            .clone()
            .oneshot(get_with_cookie(&format!("/add_quiz/{doc}"), &student))
            .await
            .unwrap();
        assert_eq!(location(&response), "/?error=access_denied");

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(&format!("/add_quiz/{doc}"), &student, batch))
            .await
            .unwrap();
        assert_eq!(location(&response), "/?error=access_denied");
        assert_eq!(count_rows(&state, "SELECT COUNT(*) FROM quizzes").await, 0);

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(&format!("/add_quiz/{doc}"), &trainer, batch))
            .await
            .unwrap();
        assert_eq!(location(&response), format!("/add_quiz/{doc}?status=quiz_saved"));

        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE document_id = ? ORDER BY id")
            .bind(doc)
            .fetch_all(state.pool_ref())
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(
                &format!("/start_quiz/{doc}"),
                &student,
                &format!("answer_{}=Left", ids[0]),
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), format!("/start_quiz/{doc}?error=unanswered"));
        assert_eq!(count_rows(&state, "SELECT COUNT(*) FROM quiz_submissions").await, 0);

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(
                &format!("/start_quiz/{doc}"),
                &student,
                &format!("answer_{}=%20Left%20&answer_{}=Nobody", ids[0], ids[1]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("1 of 2 answers correct."));

        let stored: Vec<String> = sqlx::query_scalar(
            "SELECT status FROM quiz_submissions ORDER BY quiz_id",
        )
        .fetch_all(state.pool_ref())
        .await
        .unwrap();
        assert_eq!(stored, vec!["completed", "failed"]);
    }

    #[tokio::test]
    async fn every_training_submit_route_stores_the_graded_status() {
        let (_dir, state, app) = spawn_app().await;
        add_user(&state, "tina", Role::Trainer).await;
        add_user(&state, "sam", Role::Student).await;
        let trainer = login(&app, "tina", "pw").await;
        let student = login(&app, "sam", "pw").await;
        let doc = upload_as(&app, &state, &trainer, "drill.txt").await;

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(
                &format!("/complete_training/{doc}"),
                &student,
                "answer=A",
            ))
            .await
            .unwrap();
        assert_eq!(
            location(&response),
            format!("/start_training/{doc}?error=no_training_check")
        );

        let response = app
            .clone()
            .oneshot(form_post_with_cookie(
                &format!("/add_quiz/{doc}"),
                &trainer,
                "question_1=Pick%20A&option_a_1=A&option_b_1=B&correct_answer_1=A",
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), format!("/add_quiz/{doc}?status=quiz_saved"));

        let attempts = [
            ("start_training", "answer=B", "training_retake", "re-take"),
            ("submit_training", "answer=%20A%20", "training_completed", "completed"),
            (
                "complete_training",
                "answer=B&correct_answer=B",
                "training_retake",
                "re-take",
            ),
        ];
        for (route, body, code, stored) in attempts {
            let response = app
                .clone()
                .oneshot(form_post_with_cookie(&format!("/{route}/{doc}"), &student, body))
                .await
                .unwrap();
            assert_eq!(
                location(&response),
                format!("/start_training/{doc}?status={code}"),
                "{route}"
            );

            let status: String = sqlx::query_scalar(
                "SELECT status FROM training_completions WHERE document_id = ?",
            )
            .bind(doc)
            .fetch_one(state.pool_ref())
            .await
            .unwrap();
            assert_eq!(status, stored, "{route}");
        }

        let response = app
            .oneshot(form_post_with_cookie(
                &format!("/submit_training/{doc}"),
                &student,
                "answer=%20",
            ))
            .await
            .unwrap();
        assert_eq!(
            location(&response),
            format!("/start_training/{doc}?error=missing_answer")
        );
        assert_eq!(
            count_rows(&state, "SELECT COUNT(*) FROM training_completions").await,
            1
        );
    }

    #[tokio::test]
    async fn dashboard_is_admin_only() {
        let (_dir, state, app) = spawn_app().await;
        add_user(&state, "sam", Role::Student).await;
        let student = login(&app, "sam", "pw").await;
        let admin = login(&app, "admin", "change-me").await;

        let response = app
            .clone()
            .oneshot(get_with_cookie("/dashboard", &student))
            .await
            .unwrap();
        assert_eq!(location(&response), "/?error=access_denied");

        let response = app
            .clone()
            .oneshot(get_with_cookie("/dashboard", &admin))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("sam"));

        let response = app
            .oneshot(get_with_cookie("/dashboard/summary.json", &admin))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["quizzes"], serde_json::json!([]));
    }
}
