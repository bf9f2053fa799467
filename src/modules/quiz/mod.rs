use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap},
};

use axum::{
    Router,
    extract::{Form, Path, Query, State},
    response::{Html, Redirect},
    routing::get,
};
use tracing::{error, info, warn};

pub mod store;

use crate::{
    grading::{self, QuizStatus},
    modules::documents::{DocumentRow, fetch_document},
    web::{
        AppState, CurrentUser, FlashQuery, PageLayout, compose_flash_message, escape_html,
        render_page, render_status_tag,
    },
};

pub use store::{NewQuestion, QuizQuestion, SubmittedAnswer};

const BLANK_QUESTION_ROWS: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add_quiz/:doc_id", get(add_quiz_page).post(save_quiz))
        .route("/start_quiz/:doc_id", get(quiz_page).post(submit_quiz))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizFormError {
    NoQuestions,
    InvalidQuestion(usize),
    Unanswered(i64),
}

impl QuizFormError {
    pub fn code(&self) -> &'static str {
        match self {
            QuizFormError::NoQuestions => "no_questions",
            QuizFormError::InvalidQuestion(_) => "invalid_question",
            QuizFormError::Unanswered(_) => "unanswered",
        }
    }
}

/// Reads `question_N`, `option_a_N`..`option_d_N` and `correct_answer_N` rows.
///
/// Rows left completely blank are skipped. Any other row must have the question
/// text, options A and B, and a correct answer equal to one of its options.
pub fn parse_question_batch(
    fields: &HashMap<String, String>,
) -> Result<Vec<NewQuestion>, QuizFormError> {
    let indices: BTreeSet<usize> = fields
        .keys()
        .filter_map(|key| key.rsplit_once('_'))
        .filter_map(|(_, index)| index.parse::<usize>().ok())
        .collect();

    let value = |name: &str, index: usize| {
        fields
            .get(&format!("{name}_{index}"))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut questions = Vec::new();
    for index in indices {
        let question = value("question", index);
        let options: Vec<String> = ["option_a", "option_b", "option_c", "option_d"]
            .iter()
            .map(|name| value(name, index))
            .collect();
        let correct_answer = value("correct_answer", index);

        if question.is_empty() && correct_answer.is_empty() && options.iter().all(String::is_empty)
        {
            continue;
        }

        let valid = !question.is_empty()
            && !options[0].is_empty()
            && !options[1].is_empty()
            && !correct_answer.is_empty();
        if !valid {
            return Err(QuizFormError::InvalidQuestion(index));
        }

        let options: Vec<String> = options.into_iter().filter(|o| !o.is_empty()).collect();
        if !options
            .iter()
            .any(|option| grading::answers_match(option, &correct_answer))
        {
            return Err(QuizFormError::InvalidQuestion(index));
        }

        questions.push(NewQuestion {
            question,
            options,
            correct_answer,
        });
    }

    if questions.is_empty() {
        return Err(QuizFormError::NoQuestions);
    }

    Ok(questions)
}

/// Pairs every question of a document with its submitted `answer_<id>` field.
/// Nothing is returned unless all questions were answered.
pub fn collect_quiz_answers(
    questions: &[QuizQuestion],
    answers: &HashMap<String, String>,
) -> Result<Vec<SubmittedAnswer>, QuizFormError> {
    questions
        .iter()
        .map(|question| -> Result<SubmittedAnswer, QuizFormError> {
            let selected = answers
                .get(&format!("answer_{}", question.id))
                .map(|answer| answer.trim())
                .filter(|answer| !answer.is_empty())
                .ok_or(QuizFormError::Unanswered(question.id))?;

            Ok(SubmittedAnswer {
                quiz_id: question.id,
                question: question.question.clone(),
                selected_answer: selected.to_string(),
                correct_answer: question.correct_answer.clone(),
            })
        })
        .collect()
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

async fn add_quiz_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    user.require_content_manager()?;
    let document = load_document(&state, doc_id).await?;

    let existing = store::fetch_questions(state.pool_ref(), doc_id)
        .await
        .unwrap_or_else(|err| {
            error!(?err, doc_id, "failed to load existing questions");
            Vec::new()
        });

    let existing_html = if existing.is_empty() {
        r#"<p class="note">No questions yet. The first question also serves as the training comprehension check.</p>"#.to_string()
    } else {
        let items = existing
            .iter()
            .map(|q| {
                format!(
                    "<li>{question} <span class=\"note\">(answer: {answer})</span></li>",
                    question = escape_html(&q.question),
                    answer = escape_html(&q.correct_answer),
                )
            })
            .collect::<String>();
        format!("<ol>{items}</ol>")
    };

    let rows = (1..=BLANK_QUESTION_ROWS)
        .map(|n| {
            format!(
                r#"            <div class="question">
                <label for="question_{n}">Question {n}</label>
                <input id="question_{n}" type="text" name="question_{n}">
                <label>Options (A and B required)</label>
                <input type="text" name="option_a_{n}" placeholder="Option A">
                <input type="text" name="option_b_{n}" placeholder="Option B">
                <input type="text" name="option_c_{n}" placeholder="Option C (optional)">
                <input type="text" name="option_d_{n}" placeholder="Option D (optional)">
                <label for="correct_answer_{n}">Correct answer (must match an option)</label>
                <input id="correct_answer_{n}" type="text" name="correct_answer_{n}">
            </div>
"#
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <section class="panel">
            <h2>Existing questions</h2>
            {existing_html}
        </section>
        <section class="panel">
            <h2>Add questions</h2>
            <p class="note">Leave unused rows blank.</p>
            <form method="post" action="/add_quiz/{doc_id}">
{rows}                <button type="submit">Save questions</button>
            </form>
        </section>"#
    );

    let title = format!("Quiz for {}", document.title);
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_page(PageLayout {
        title: &title,
        user: Some(&user),
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
    })))
}

async fn save_quiz(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Form(fields): Form<HashMap<String, String>>,
) -> Redirect {
    if let Err(redirect) = user.require_content_manager() {
        return redirect;
    }
    if let Err(redirect) = load_document(&state, doc_id).await {
        return redirect;
    }

    let questions = match parse_question_batch(&fields) {
        Ok(questions) => questions,
        Err(err) => {
            return Redirect::to(&format!("/add_quiz/{doc_id}?error={}", err.code()));
        }
    };

    match store::insert_questions(state.pool_ref(), doc_id, &questions).await {
        Ok(count) => {
            info!(doc_id, count, user_id = user.id, "quiz questions added");
            Redirect::to(&format!("/add_quiz/{doc_id}?status=quiz_saved"))
        }
        Err(err) => {
            error!(?err, doc_id, "failed to save quiz questions");
            Redirect::to(&format!("/add_quiz/{doc_id}?error=unknown"))
        }
    }
}

async fn quiz_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    let document = load_document(&state, doc_id).await?;
    let questions = store::fetch_questions(state.pool_ref(), doc_id)
        .await
        .map_err(|err| {
            error!(?err, doc_id, "failed to load quiz questions");
            Redirect::to("/documents?error=unknown")
        })?;

    if questions.is_empty() {
        return Err(Redirect::to("/documents?error=quiz_empty"));
    }

    let items = questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let options = question
                .options()
                .into_iter()
                .map(|option| {
                    format!(
                        r#"<label class="option"><input type="radio" name="answer_{id}" value="{value}" required> {value}</label>"#,
                        id = question.id,
                        value = escape_html(option),
                    )
                })
                .collect::<String>();
            format!(
                r#"            <div class="question"><p><strong>{n}. {text}</strong></p>{options}</div>
"#,
                n = idx + 1,
                text = escape_html(&question.question),
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <section class="panel">
            <form method="post" action="/start_quiz/{doc_id}">
{items}                <button type="submit">Submit answers</button>
            </form>
        </section>"#
    );

    let title = format!("Quiz: {}", document.title);
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_page(PageLayout {
        title: &title,
        user: Some(&user),
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
    })))
}

async fn submit_quiz(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(doc_id): Path<i64>,
    Form(answers): Form<HashMap<String, String>>,
) -> Result<Html<String>, Redirect> {
    let document = load_document(&state, doc_id).await?;
    let questions = store::fetch_questions(state.pool_ref(), doc_id)
        .await
        .map_err(|err| {
            error!(?err, doc_id, "failed to load quiz questions");
            Redirect::to("/documents?error=unknown")
        })?;

    if questions.is_empty() {
        return Err(Redirect::to("/documents?error=quiz_empty"));
    }

    let submitted = collect_quiz_answers(&questions, &answers).map_err(|err| {
        warn!(doc_id, user_id = user.id, ?err, "incomplete quiz submission");
        Redirect::to(&format!("/start_quiz/{doc_id}?error={}", err.code()))
    })?;

    let graded = store::record_quiz_submission(state.pool_ref(), user.id, &submitted)
        .await
        .map_err(|err| {
            error!(?err, doc_id, user_id = user.id, "failed to record quiz answers");
            Redirect::to(&format!("/start_quiz/{doc_id}?error=unknown"))
        })?;

    let correct = graded
        .iter()
        .filter(|answer| answer.status == QuizStatus::Completed)
        .count();
    info!(doc_id, user_id = user.id, correct, total = graded.len(), "quiz submitted");

    let rows = graded
        .iter()
        .map(|answer| {
            format!(
                "<tr><td>{question}</td><td>{selected}</td><td>{status}</td></tr>",
                question = escape_html(&answer.question),
                selected = escape_html(&answer.selected_answer),
                status = render_status_tag(answer.status.as_str()),
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <section class="panel">
            <h2>Results</h2>
            <p>{correct} of {total} answers correct.</p>
            <table>
                <tr><th>Question</th><th>Your answer</th><th>Result</th></tr>
                {rows}
            </table>
            <p><a href="/start_quiz/{doc_id}">Retake quiz</a> · <a href="/documents">Back to documents</a></p>
        </section>"#,
        total = graded.len(),
    );

    let title = format!("Quiz results: {}", document.title);
    Ok(Html(render_page(PageLayout {
        title: &title,
        user: Some(&user),
        flash_html: Cow::Borrowed(""),
        body_html: Cow::Owned(body),
    })))
}
