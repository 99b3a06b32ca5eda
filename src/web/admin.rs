//! Admin console (staff only)
//!
//! - GET/POST /admin/courses/ - course list, filters, status and publish actions
//! - GET/POST /admin/courses/add/, /admin/courses/{id}/change/
//! - POST /admin/courses/{id}/delete/
//! - GET/POST /admin/texts/add/, /admin/texts/{id}/change/
//! - POST /admin/texts/{id}/delete/
//! - GET /admin/quizzes/?q=
//! - GET/POST /admin/quizzes/add/, /admin/quizzes/{id}/change/
//! - POST /admin/quizzes/{id}/delete/
//! - POST /admin/questions/{id}/delete/

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use super::error::WebError;
use super::middleware::require_staff;
use super::page::{redirect_with_flash, Page};
use super::AppState;
use crate::forms::{AdminQuizForm, CourseForm, CourseListAction, FormData, FormErrors, TextForm};
use crate::models::{AdminCourseFilter, Course, CourseStatus, QuestionWithAnswers, Quiz, Text};
use crate::services::{CourseServiceError, QuizServiceError};

const COURSE_LIST_URL: &str = "/admin/courses/";

const QUIZ_LIST_URL: &str = "/admin/quizzes/";

fn quiz_change_url(id: i64) -> String {
    format!("/admin/quizzes/{}/change/", id)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/courses/", get(course_list).post(course_list_action))
        .route("/admin/courses/add/", get(course_add_page).post(course_add))
        .route(
            "/admin/courses/{id}/change/",
            get(course_change_page).post(course_change),
        )
        .route("/admin/courses/{id}/delete/", post(course_delete))
        .route("/admin/texts/add/", get(text_add_page).post(text_add))
        .route("/admin/texts/{id}/change/", get(text_change_page).post(text_change))
        .route("/admin/texts/{id}/delete/", post(text_delete))
        .route("/admin/quizzes/", get(quiz_list))
        .route("/admin/quizzes/add/", get(quiz_add_page).post(quiz_add))
        .route("/admin/quizzes/{id}/change/", get(quiz_change_page).post(quiz_change))
        .route("/admin/quizzes/{id}/delete/", post(quiz_delete))
        .route("/admin/questions/{id}/delete/", post(question_delete))
        .route_layer(middleware::from_fn(require_staff))
}

fn form_error(e: CourseServiceError) -> Result<String, WebError> {
    match e {
        CourseServiceError::ValidationError(msg) => Ok(msg),
        other => Err(other.into()),
    }
}

fn quiz_form_error(e: QuizServiceError) -> Result<String, WebError> {
    match e {
        QuizServiceError::ValidationError(msg) => Ok(msg),
        other => Err(other.into()),
    }
}

// ============================================================================
// Course list
// ============================================================================

/// Raw list filters; blank or malformed values are ignored
#[derive(Debug, Default, Deserialize)]
pub struct CourseListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

impl CourseListQuery {
    pub fn filter(&self) -> AdminCourseFilter {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        AdminCourseFilter {
            q: non_empty(&self.q),
            title: non_empty(&self.title),
            year: self.year.as_deref().and_then(|y| y.trim().parse().ok()),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusChoice {
    code: &'static str,
    label: &'static str,
}

async fn course_list(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
    page: Page,
) -> Result<Response, WebError> {
    let filter = query.filter();
    let rows = state.course_service.admin_list(&filter).await?;
    let titles = state.course_service.admin_titles().await?;
    let statuses: Vec<StatusChoice> = CourseStatus::ALL
        .iter()
        .map(|s| StatusChoice {
            code: s.code(),
            label: s.label(),
        })
        .collect();

    let mut context = TeraContext::new();
    context.insert("rows", &rows);
    context.insert("filter", &filter);
    context.insert("titles", &titles);
    context.insert("statuses", &statuses);
    page.render(&state, "admin/course_list.html", &context)
}

async fn course_list_action(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let message = match CourseListAction::from_data(&FormData::new(pairs)) {
        Ok(CourseListAction::SaveStatuses(changes)) => {
            let count = state.course_service.update_statuses(&changes).await?;
            format!("{} course(s) were changed successfully.", count)
        }
        Ok(CourseListAction::MakePublished(ids)) => {
            let count = state.course_service.make_published(&ids).await?;
            format!("{} course(s) marked as published.", count)
        }
        Err(message) => message,
    };
    Ok(redirect_with_flash(COURSE_LIST_URL, &message))
}

// ============================================================================
// Course forms
// ============================================================================

async fn render_course_form(
    state: &AppState,
    page: Page,
    course: Option<&Course>,
    form: &CourseForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let teachers = state.user_service.list_users().await?;

    let mut context = TeraContext::new();
    context.insert("course", &course);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("teachers", &teachers);
    page.render(state, "admin/course_form.html", &context)
}

/// Validate the form, including that the chosen teacher exists
async fn validate_course_form(state: &AppState, form: &CourseForm) -> Result<crate::models::CourseInput, FormErrors> {
    let input = form.validate()?;
    match state.user_service.list_users().await {
        Ok(users) if users.iter().any(|u| u.id == input.teacher_id) => Ok(input),
        Ok(_) => {
            let mut errors = FormErrors::default();
            errors.add("teacher_id", "Select a valid choice.");
            Err(errors)
        }
        Err(e) => {
            tracing::error!("Failed to list teachers: {}", e);
            let mut errors = FormErrors::default();
            errors.add_non_field("Could not verify the teacher, try again.");
            Err(errors)
        }
    }
}

async fn course_add_page(State(state): State<AppState>, page: Page) -> Result<Response, WebError> {
    render_course_form(&state, page, None, &CourseForm::default(), &FormErrors::default()).await
}

async fn course_add(
    State(state): State<AppState>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let form = CourseForm::from_data(&FormData::new(pairs));

    let errors = match validate_course_form(&state, &form).await {
        Ok(input) => match state.course_service.create(input).await {
            Ok(course) => {
                let message = format!("The course \"{}\" was added successfully.", course.title);
                return Ok(redirect_with_flash(COURSE_LIST_URL, &message));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add_non_field(form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_course_form(&state, page, None, &form, &errors).await
}

async fn course_change_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let course = state.course_service.get(id).await?;
    let form = CourseForm::from_course(&course);
    render_course_form(&state, page, Some(&course), &form, &FormErrors::default()).await
}

async fn course_change(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let course = state.course_service.get(id).await?;
    let form = CourseForm::from_data(&FormData::new(pairs));

    let errors = match validate_course_form(&state, &form).await {
        Ok(input) => match state.course_service.update(id, input).await {
            Ok(updated) => {
                let message = format!("The course \"{}\" was changed successfully.", updated.title);
                return Ok(redirect_with_flash(COURSE_LIST_URL, &message));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add_non_field(form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_course_form(&state, page, Some(&course), &form, &errors).await
}

async fn course_delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, WebError> {
    let course = state.course_service.get(id).await?;
    state.course_service.delete(id).await?;
    let message = format!("The course \"{}\" was deleted successfully.", course.title);
    Ok(redirect_with_flash(COURSE_LIST_URL, &message))
}

// ============================================================================
// Text forms
// ============================================================================

async fn render_text_form(
    state: &AppState,
    page: Page,
    text: Option<&Text>,
    form: &TextForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let courses = state.course_service.all_courses().await?;

    let mut context = TeraContext::new();
    context.insert("text", &text);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("courses", &courses);
    page.render(state, "admin/text_form.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct TextAddQuery {
    #[serde(default)]
    pub course: Option<i64>,
}

async fn text_add_page(
    State(state): State<AppState>,
    Query(query): Query<TextAddQuery>,
    page: Page,
) -> Result<Response, WebError> {
    let form = TextForm {
        course_id: query.course.map(|id| id.to_string()).unwrap_or_default(),
        ..Default::default()
    };
    render_text_form(&state, page, None, &form, &FormErrors::default()).await
}

async fn text_add(
    State(state): State<AppState>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let form = TextForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok(input) => match state.course_service.create_text(input).await {
            Ok(text) => {
                let message = format!("The text \"{}\" was added successfully.", text.title);
                return Ok(redirect_with_flash(
                    &format!("/admin/courses/{}/change/", text.course_id),
                    &message,
                ));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add("course_id", form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_text_form(&state, page, None, &form, &errors).await
}

async fn text_change_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let text = state.course_service.get_text(id).await?;
    let form = TextForm::from_text(&text);
    render_text_form(&state, page, Some(&text), &form, &FormErrors::default()).await
}

async fn text_change(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let text = state.course_service.get_text(id).await?;
    let form = TextForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok(input) => match state.course_service.update_text(id, input).await {
            Ok(updated) => {
                let message = format!("The text \"{}\" was changed successfully.", updated.title);
                return Ok(redirect_with_flash(
                    &format!("/admin/courses/{}/change/", updated.course_id),
                    &message,
                ));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add("course_id", form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_text_form(&state, page, Some(&text), &form, &errors).await
}

async fn text_delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, WebError> {
    let text = state.course_service.get_text(id).await?;
    state.course_service.delete_text(id).await?;
    let message = format!("The text \"{}\" was deleted successfully.", text.title);
    Ok(redirect_with_flash(
        &format!("/admin/courses/{}/change/", text.course_id),
        &message,
    ))
}

// ============================================================================
// Quiz list
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QuizListQuery {
    #[serde(default)]
    pub q: Option<String>,
}

async fn quiz_list(
    State(state): State<AppState>,
    Query(query): Query<QuizListQuery>,
    page: Page,
) -> Result<Response, WebError> {
    let quizzes = state.quiz_service.admin_quizzes(query.q.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("quizzes", &quizzes);
    context.insert("q", &query.q);
    page.render(&state, "admin/quiz_list.html", &context)
}

// ============================================================================
// Quiz forms
// ============================================================================

async fn render_quiz_form(
    state: &AppState,
    page: Page,
    quiz: Option<&Quiz>,
    form: &AdminQuizForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let courses = state.course_service.all_courses().await?;
    let questions: Vec<QuestionWithAnswers> = match quiz {
        Some(quiz) => state.quiz_service.quiz_questions(quiz.id).await?,
        None => Vec::new(),
    };

    let mut context = TeraContext::new();
    context.insert("quiz", &quiz);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("courses", &courses);
    context.insert("questions", &questions);
    page.render(state, "admin/quiz_form.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct QuizAddQuery {
    #[serde(default)]
    pub course: Option<i64>,
}

async fn quiz_add_page(
    State(state): State<AppState>,
    Query(query): Query<QuizAddQuery>,
    page: Page,
) -> Result<Response, WebError> {
    let form = AdminQuizForm {
        course_id: query.course.map(|id| id.to_string()).unwrap_or_default(),
        ..Default::default()
    };
    render_quiz_form(&state, page, None, &form, &FormErrors::default()).await
}

async fn quiz_add(
    State(state): State<AppState>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let form = AdminQuizForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok((course_id, input)) => match state.quiz_service.admin_create_quiz(course_id, input).await {
            Ok(quiz) => {
                let message = format!("The quiz \"{}\" was added successfully.", quiz.title);
                return Ok(redirect_with_flash(&quiz_change_url(quiz.id), &message));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add("course_id", quiz_form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_quiz_form(&state, page, None, &form, &errors).await
}

async fn quiz_change_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(id).await?;
    let form = AdminQuizForm::from_quiz(&quiz);
    render_quiz_form(&state, page, Some(&quiz), &form, &FormErrors::default()).await
}

async fn quiz_change(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let quiz = state.quiz_service.get_quiz(id).await?;
    let form = AdminQuizForm::from_data(&FormData::new(pairs));

    let errors = match form.validate() {
        Ok((course_id, input)) => match state.quiz_service.admin_update_quiz(id, course_id, input).await {
            Ok(updated) => {
                let message = format!("The quiz \"{}\" was changed successfully.", updated.title);
                return Ok(redirect_with_flash(QUIZ_LIST_URL, &message));
            }
            Err(e) => {
                let mut errors = FormErrors::default();
                errors.add("course_id", quiz_form_error(e)?);
                errors
            }
        },
        Err(errors) => errors,
    };

    render_quiz_form(&state, page, Some(&quiz), &form, &errors).await
}

async fn quiz_delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, WebError> {
    let quiz = state.quiz_service.delete_quiz(id).await?;
    let message = format!("The quiz \"{}\" was deleted successfully.", quiz.title);
    Ok(redirect_with_flash(QUIZ_LIST_URL, &message))
}

async fn question_delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, WebError> {
    let removed = state.quiz_service.delete_question(id).await?;
    let message = format!(
        "The question \"{}\" was deleted successfully.",
        removed.question.question.prompt
    );
    Ok(redirect_with_flash(&quiz_change_url(removed.quiz.id), &message))
}
