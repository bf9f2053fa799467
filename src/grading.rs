//! Answer comparison and the status values stored for quiz and training attempts.

/// Outcome of a single quiz question, stored in `quiz_submissions.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizStatus {
    Completed,
    Failed,
}

impl QuizStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Completed => "completed",
            QuizStatus::Failed => "failed",
        }
    }
}

/// Training status per (user, document), stored in `training_completions.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Pending,
    Completed,
    Retake,
}

impl TrainingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrainingStatus::Pending => "pending",
            TrainingStatus::Completed => "completed",
            TrainingStatus::Retake => "re-take",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TrainingStatus::Pending),
            "completed" => Some(TrainingStatus::Completed),
            "re-take" => Some(TrainingStatus::Retake),
            _ => None,
        }
    }
}

/// Surrounding whitespace is ignored; case is significant.
pub fn normalize_answer(answer: &str) -> &str {
    answer.trim()
}

pub fn answers_match(submitted: &str, correct: &str) -> bool {
    normalize_answer(submitted) == normalize_answer(correct)
}

pub fn grade_quiz_answer(selected: &str, correct: &str) -> QuizStatus {
    if answers_match(selected, correct) {
        QuizStatus::Completed
    } else {
        QuizStatus::Failed
    }
}

pub fn grade_training_answer(submitted: &str, correct: &str) -> TrainingStatus {
    if answers_match(submitted, correct) {
        TrainingStatus::Completed
    } else {
        TrainingStatus::Retake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(grade_quiz_answer(" 4 ", "4"), QuizStatus::Completed);
        assert_eq!(grade_training_answer("4\n", "  4"), TrainingStatus::Completed);
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert_eq!(grade_quiz_answer("paris", "Paris"), QuizStatus::Failed);
        assert_eq!(grade_training_answer("a", "A"), TrainingStatus::Retake);
    }

    #[test]
    fn inner_whitespace_is_significant() {
        assert!(!answers_match("New  York", "New York"));
    }
}
