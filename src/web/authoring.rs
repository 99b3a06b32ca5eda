//! Quiz authoring pages (login required)
//!
//! - GET/POST /courses/{course_id}/quiz/add/
//! - GET/POST /courses/{course_id}/quiz/{quiz_id}/edit/
//! - GET/POST /quizzes/{quiz_id}/questions/add/{kind}/
//! - GET/POST /quizzes/{quiz_id}/questions/{question_id}/edit/
//! - GET/POST /questions/{question_id}/answers/

use axum::{
    extract::{Path, State},
    middleware,
    response::Response,
    routing::get,
    Form, Router,
};
use serde::Serialize;
use tera::Context as TeraContext;

use super::error::WebError;
use super::middleware::{require_login, AuthenticatedUser};
use super::page::{redirect_with_flash, Page};
use super::AppState;
use crate::forms::{AnswerFormSet, FormData, FormErrors, QuestionForm, QuizForm};
use crate::models::{Course, Question, QuestionKind, Quiz};
use crate::services::QuizServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/quiz/add/", get(quiz_create_page).post(quiz_create))
        .route(
            "/courses/{course_id}/quiz/{quiz_id}/edit/",
            get(quiz_edit_page).post(quiz_edit),
        )
        .route(
            "/quizzes/{quiz_id}/questions/add/{kind}/",
            get(create_question_page).post(create_question),
        )
        .route(
            "/quizzes/{quiz_id}/questions/{question_id}/edit/",
            get(edit_question_page).post(edit_question),
        )
        .route(
            "/questions/{question_id}/answers/",
            get(answer_form_page).post(answer_form),
        )
        .route_layer(middleware::from_fn(require_login))
}

pub fn quiz_url(course_id: i64, quiz_id: i64) -> String {
    format!("/courses/{}/quiz/{}/", course_id, quiz_id)
}

/// Service validation failures become form errors, anything else an error page
fn form_error(e: QuizServiceError) -> Result<String, WebError> {
    match e {
        QuizServiceError::ValidationError(msg) => Ok(msg),
        other => Err(other.into()),
    }
}

// ============================================================================
// Quizzes
// ============================================================================

fn render_quiz_form(
    state: &AppState,
    page: Page,
    course: &Course,
    quiz: Option<&Quiz>,
    form: &QuizForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("course", course);
    context.insert("quiz", &quiz);
    context.insert("form", form);
    context.insert("errors", errors);
    page.render(state, "courses/quiz_form.html", &context)
}

async fn quiz_create_page(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let course = state.quiz_service.published_course(course_id).await?;
    render_quiz_form(&state, page, &course, None, &QuizForm::default(), &FormErrors::default())
}

async fn quiz_create(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    AuthenticatedUser(user): AuthenticatedUser,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let course = state.quiz_service.published_course(course_id).await?;
    let form = QuizForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok(input) => match state.quiz_service.create_quiz(course_id, input).await {
            Ok(quiz) => {
                tracing::info!("{} added quiz {} to course {}", user.username, quiz.id, course_id);
                return Ok(redirect_with_flash(&quiz_url(course_id, quiz.id), "Quiz added!"));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add_non_field(form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_quiz_form(&state, page, &course, None, &form, &errors)
}

async fn quiz_edit_page(
    State(state): State<AppState>,
    Path((course_id, quiz_id)): Path<(i64, i64)>,
    page: Page,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.quiz_in_published_course(course_id, quiz_id).await?;
    let course = state.quiz_service.published_course(course_id).await?;
    render_quiz_form(
        &state,
        page,
        &course,
        Some(&quiz),
        &QuizForm::from_quiz(&quiz),
        &FormErrors::default(),
    )
}

async fn quiz_edit(
    State(state): State<AppState>,
    Path((course_id, quiz_id)): Path<(i64, i64)>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.quiz_in_published_course(course_id, quiz_id).await?;
    let course = state.quiz_service.published_course(course_id).await?;
    let form = QuizForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok(input) => match state.quiz_service.update_quiz(course_id, quiz_id, input).await {
            Ok(updated) => {
                let message = format!("Updated {}", updated.title);
                return Ok(redirect_with_flash(&quiz_url(course_id, quiz_id), &message));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add_non_field(form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_quiz_form(&state, page, &course, Some(&quiz), &form, &errors)
}

// ============================================================================
// Questions
// ============================================================================

/// Kind information for the question template
#[derive(Debug, Serialize)]
struct KindInfo {
    code: &'static str,
    label: &'static str,
    is_multiple_choice: bool,
}

impl From<QuestionKind> for KindInfo {
    fn from(kind: QuestionKind) -> Self {
        Self {
            code: kind.code(),
            label: kind.label(),
            is_multiple_choice: kind.is_multiple_choice(),
        }
    }
}

struct QuestionPage<'a> {
    quiz: &'a Quiz,
    kind: QuestionKind,
    question: Option<&'a Question>,
    form: &'a QuestionForm,
    errors: &'a FormErrors,
    formset: &'a AnswerFormSet,
}

fn render_question_form(state: &AppState, page: Page, view: QuestionPage<'_>) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("quiz", view.quiz);
    context.insert("kind", &KindInfo::from(view.kind));
    context.insert("question", &view.question);
    context.insert("form", view.form);
    context.insert("errors", view.errors);
    context.insert("formset", view.formset);
    page.render(state, "courses/question_form.html", &context)
}

async fn create_question_page(
    State(state): State<AppState>,
    Path((quiz_id, kind)): Path<(i64, String)>,
    page: Page,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(quiz_id).await?;
    render_question_form(
        &state,
        page,
        QuestionPage {
            quiz: &quiz,
            kind: QuestionKind::from_route(&kind),
            question: None,
            form: &QuestionForm::default(),
            errors: &FormErrors::default(),
            formset: &AnswerFormSet::for_answers(&[]),
        },
    )
}

async fn create_question(
    State(state): State<AppState>,
    Path((quiz_id, kind)): Path<(i64, String)>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(quiz_id).await?;
    let kind = QuestionKind::from_route(&kind);
    let data = FormData::new(pairs);
    let form = QuestionForm::from_data(&data);
    let mut formset = AnswerFormSet::from_data(&data);

    let question = form.validate(kind);
    let answers = formset.validate(&[], true, true);
    let mut errors = FormErrors::default();

    match (question, answers) {
        (Ok(input), Some(changes)) => {
            match state.quiz_service.create_question(quiz_id, input, changes.save).await {
                Ok(_) => {
                    return Ok(redirect_with_flash(&quiz_url(quiz.course_id, quiz.id), "Added question"));
                }
                Err(e) => formset.non_form_errors.push(form_error(e)?),
            }
        }
        (Err(e), _) => errors = e,
        (Ok(_), None) => {}
    }

    render_question_form(
        &state,
        page,
        QuestionPage {
            quiz: &quiz,
            kind,
            question: None,
            form: &form,
            errors: &errors,
            formset: &formset,
        },
    )
}

async fn edit_question_page(
    State(state): State<AppState>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
    page: Page,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(quiz_id).await?;
    let existing = state.quiz_service.question_in_quiz(quiz_id, question_id).await?;
    render_question_form(
        &state,
        page,
        QuestionPage {
            quiz: &quiz,
            kind: existing.question.kind,
            question: Some(&existing.question),
            form: &QuestionForm::from_question(&existing.question),
            errors: &FormErrors::default(),
            formset: &AnswerFormSet::for_answers(&existing.answers),
        },
    )
}

async fn edit_question(
    State(state): State<AppState>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(quiz_id).await?;
    let existing = state.quiz_service.question_in_quiz(quiz_id, question_id).await?;
    let kind = existing.question.kind;
    let data = FormData::new(pairs);
    let form = QuestionForm::from_data(&data);
    let mut formset = AnswerFormSet::from_data(&data);

    let question = form.validate(kind);
    let answers = formset.validate(&existing.answer_ids(), true, true);
    let mut errors = FormErrors::default();

    match (question, answers) {
        (Ok(input), Some(changes)) => {
            match state
                .quiz_service
                .update_question(quiz_id, question_id, input, changes)
                .await
            {
                Ok(_) => {
                    return Ok(redirect_with_flash(&quiz_url(quiz.course_id, quiz.id), "Updated question"));
                }
                Err(e) => formset.non_form_errors.push(form_error(e)?),
            }
        }
        (Err(e), _) => errors = e,
        (Ok(_), None) => {}
    }

    render_question_form(
        &state,
        page,
        QuestionPage {
            quiz: &quiz,
            kind,
            question: Some(&existing.question),
            form: &form,
            errors: &errors,
            formset: &formset,
        },
    )
}

// ============================================================================
// Answers
// ============================================================================

async fn answer_form_page(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let ctx = state.quiz_service.question_context(question_id).await?;
    let formset = AnswerFormSet::for_answers(&ctx.question.answers);

    let mut context = TeraContext::new();
    context.insert("quiz", &ctx.quiz);
    context.insert("question", &ctx.question.question);
    context.insert("formset", &formset);
    page.render(&state, "courses/answer_form.html", &context)
}

async fn answer_form(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let ctx = state.quiz_service.question_context(question_id).await?;
    let mut formset = AnswerFormSet::from_data(&FormData::new(pairs));

    if let Some(changes) = formset.validate(&ctx.question.answer_ids(), false, false) {
        match state.quiz_service.save_answers(question_id, changes.save).await {
            Ok(_) => {
                return Ok(redirect_with_flash(
                    &quiz_url(ctx.quiz.course_id, ctx.quiz.id),
                    "Added answers",
                ));
            }
            Err(e) => formset.non_form_errors.push(form_error(e)?),
        }
    }

    let mut context = TeraContext::new();
    context.insert("quiz", &ctx.quiz);
    context.insert("question", &ctx.question.question);
    context.insert("formset", &formset);
    page.render(&state, "courses/answer_form.html", &context)
}
