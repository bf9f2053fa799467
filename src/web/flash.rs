use serde::Deserialize;

use crate::web::escape_html;

/// `?status=` / `?error=` codes carried across redirects.
#[derive(Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let (class, message) = match status {
            "registered" => ("success", "Registration successful! Please login."),
            "logged_in" => ("success", "Login successful!"),
            "logged_out" => ("info", "Logged out successfully."),
            "login_required" => ("info", "Please login first."),
            "uploaded" => ("success", "Document uploaded successfully."),
            "quiz_saved" => ("success", "Quiz questions saved."),
            "training_completed" => ("success", "Training completed. Well done!"),
            "training_retake" => ("warning", "That answer was not correct. Please review the document and try again."),
            _ => ("", ""),
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash {class}">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "missing_fields" => "Please fill in all required fields.",
            "missing_credentials" => "Username and password are required.",
            "invalid_credentials" => "Invalid username or password!",
            "duplicate_username" => "Username already exists!",
            "invalid_role" => "Please choose a valid account type.",
            "access_denied" => "Access denied.",
            "missing_title" => "Please provide a document title.",
            "missing_file" => "Please choose a file to upload.",
            "invalid_extension" => "File type not allowed. Upload PDF, DOCX, PPTX or TXT files.",
            "invalid_filename" => "The file name is not valid.",
            "upload_failed" => "The upload could not be saved. Please try again.",
            "document_not_found" => "Document not found.",
            "invalid_question" => "Each question needs text, options A and B, and a correct answer matching one of its options.",
            "no_questions" => "Add at least one question.",
            "quiz_empty" => "No quiz questions have been added for this document yet.",
            "unanswered" => "Please answer every question before submitting.",
            "missing_answer" => "Please enter an answer.",
            "no_training_check" => "No comprehension check is configured for this document yet.",
            _ => "Something went wrong. Please try again later.",
        };

        return format!(r#"<div class="flash error">{}</div>"#, escape_html(message));
    }

    String::new()
}
