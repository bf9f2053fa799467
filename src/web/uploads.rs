use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::{body::Bytes, extract::Multipart};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when reading or persisting uploaded files.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// A file part received from a multipart form, buffered in memory.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub field_name: String,
    pub original_name: String,
    pub bytes: Bytes,
}

/// Aggregated output of the multipart reader.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<ReceivedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn first_file_for(&self, field_name: &str) -> Option<&ReceivedFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .get(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| UploadError::new(format!("failed to create upload directory: {err}")))
}

/// Reads every part of a multipart form. Nothing touches the disk here, so a
/// rejected form leaves no partial files behind.
///
/// Parts without a filename are collected as text; file parts are accepted only
/// for the listed field names. Empty file parts (no file chosen in the browser)
/// are dropped.
pub async fn read_upload_form(
    mut multipart: Multipart,
    file_fields: &[&str],
) -> UploadResult<UploadOutcome> {
    let mut outcome = UploadOutcome::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("failed to read field `{field_name}`: {err}"))
            })?;
            outcome
                .text_fields
                .entry(field_name)
                .or_default()
                .push(value);
            continue;
        };

        if !file_fields.contains(&field_name.as_str()) {
            return Err(UploadError::new(format!(
                "unsupported file field `{field_name}`"
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| UploadError::new(format!("failed to read upload data: {err}")))?;

        if file_name.trim().is_empty() || bytes.is_empty() {
            continue;
        }

        outcome.files.push(ReceivedFile {
            field_name,
            original_name: file_name,
            bytes,
        });
    }

    Ok(outcome)
}

/// Lower-cased extension of a filename, empty when there is none.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Strips path separators and reserved names; `None` when nothing usable remains.
pub fn sanitize_upload_name(name: &str) -> Option<String> {
    let sanitized = sanitize_filename::sanitize(name.trim());
    let sanitized = sanitized.trim_start_matches('.').trim();
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized.to_string())
    }
}

/// Writes `bytes` into `dest_dir` without ever replacing an existing file: a
/// clashing name gets a `_1`, `_2`, ... suffix. Returns the stored name and path.
pub async fn persist_upload(
    dest_dir: &Path,
    sanitized_name: &str,
    bytes: &[u8],
) -> UploadResult<(String, PathBuf)> {
    ensure_directory(dest_dir).await?;

    let (stem, extension) = split_name(sanitized_name);
    let mut counter = 0usize;

    loop {
        let candidate = numbered_name(&stem, &extension, counter);
        let path = dest_dir.join(&candidate);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(bytes)
                    .await
                    .map_err(|err| UploadError::new(format!("failed to write file: {err}")))?;
                file.flush()
                    .await
                    .map_err(|err| UploadError::new(format!("failed to flush file: {err}")))?;
                return Ok((candidate, path));
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(err) => {
                return Err(UploadError::new(format!("failed to save file: {err}")));
            }
        }
    }
}

fn numbered_name(stem: &str, extension: &str, counter: usize) -> String {
    match (counter, extension.is_empty()) {
        (0, true) => stem.to_string(),
        (0, false) => format!("{}.{}", stem, extension),
        (n, true) => format!("{}_{}", stem, n),
        (n, false) => format!("{}_{}.{}", stem, n, extension),
    }
}

fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    (stem, extension)
}
