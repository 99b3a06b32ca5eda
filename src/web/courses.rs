//! Public course pages
//!
//! - GET / - redirect to the course list
//! - GET /courses/ - published courses with step totals
//! - GET /courses/{course_id}/ - course with its ordered steps
//! - GET /courses/{course_id}/text/{step_id}/ - text lesson
//! - GET /courses/{course_id}/quiz/{step_id}/ - quiz with questions
//! - GET /teacher/{username}/ - published courses by a teacher
//! - GET /search/?q= - search published courses

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::error::WebError;
use super::page::Page;
use super::AppState;
use crate::services::CourseListing;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/courses/", get(course_list))
        .route("/courses/{course_id}/", get(course_detail))
        .route("/courses/{course_id}/text/{step_id}/", get(text_detail))
        .route("/courses/{course_id}/quiz/{step_id}/", get(quiz_detail))
        .route("/teacher/{username}/", get(course_by_teacher))
        .route("/search/", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

async fn home() -> Response {
    Redirect::to("/courses/").into_response()
}

fn listing_context(listing: &CourseListing, heading: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("courses", &listing.courses);
    context.insert("total", &listing.total);
    context.insert("heading", heading);
    context.insert("query", &Option::<String>::None);
    context
}

async fn course_list(State(state): State<AppState>, page: Page) -> Result<Response, WebError> {
    let listing = state.course_service.list_published().await?;
    let context = listing_context(&listing, "Courses");
    page.render(&state, "courses/course_list.html", &context)
}

async fn course_detail(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    page: Page,
) -> Result<Response, WebError> {
    let detail = state.course_service.course_detail(course_id).await?;

    let mut context = TeraContext::new();
    context.insert("course", &detail.course);
    context.insert("steps", &detail.steps);
    page.render(&state, "courses/course_detail.html", &context)
}

async fn text_detail(
    State(state): State<AppState>,
    Path((course_id, step_id)): Path<(i64, i64)>,
    page: Page,
) -> Result<Response, WebError> {
    let detail = state.course_service.text_detail(course_id, step_id).await?;

    let mut context = TeraContext::new();
    context.insert("course", &detail.course);
    context.insert("step", &detail.step);
    page.render(&state, "courses/text_detail.html", &context)
}

async fn quiz_detail(
    State(state): State<AppState>,
    Path((course_id, step_id)): Path<(i64, i64)>,
    page: Page,
) -> Result<Response, WebError> {
    let detail = state.quiz_service.quiz_detail(course_id, step_id).await?;

    let mut context = TeraContext::new();
    context.insert("course", &detail.course);
    context.insert("step", &detail.quiz);
    context.insert("questions", &detail.questions);
    page.render(&state, "courses/quiz_detail.html", &context)
}

async fn course_by_teacher(
    State(state): State<AppState>,
    Path(username): Path<String>,
    page: Page,
) -> Result<Response, WebError> {
    let listing = state.course_service.by_teacher(&username).await?;
    let context = listing_context(&listing, &format!("Courses by {}", username));
    page.render(&state, "courses/course_list.html", &context)
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    page: Page,
) -> Result<Response, WebError> {
    let listing = state.course_service.search(query.q.as_deref()).await?;

    let mut context = listing_context(&listing, "Search results");
    context.insert("query", &query.q);
    page.render(&state, "courses/course_list.html", &context)
}
