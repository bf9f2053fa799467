use std::path::Path;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use mime::Mime;
use tracing::error;

/// Ensure the upload directory exists.
pub async fn ensure_storage_root(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to ensure storage root at {}", path.display()))
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Content type served for a stored document, chosen by extension.
pub fn content_type_for(filename: &str) -> Mime {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => mime::APPLICATION_PDF,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "docx" => DOCX_MIME.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "pptx" => PPTX_MIME.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Stream a file with an attachment disposition so browsers download it.
pub async fn stream_file(
    path: &Path,
    filename: &str,
    content_type: &Mime,
) -> Result<Response, (StatusCode, Html<String>)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        error!(?err, file = %path.display(), "failed to read download file");
        (
            StatusCode::NOT_FOUND,
            Html("<h1>File unavailable</h1><p>The requested document could not be read.</p>".to_string()),
        )
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&attachment_disposition(filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((headers, bytes).into_response())
}

/// Link to the download route for a stored name; the name is one path segment.
pub fn download_href(filename: &str) -> String {
    format!("/download/{}", urlencoding::encode(filename))
}

/// `filename` carries an ASCII fallback, `filename*` the exact UTF-8 name (RFC 5987).
fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        r#"attachment; filename="{fallback}"; filename*=UTF-8''{encoded}"#,
        encoded = urlencoding::encode(filename),
    )
}
