//! Web error type and error pages
//!
//! Handlers return `Result<Response, WebError>`. A `WebError` response only
//! carries a status and an [`ErrorPage`] marker; the [`error_pages`]
//! middleware turns marked responses into rendered `error.html` pages.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use super::middleware::AuthenticatedUser;
use super::AppState;
use crate::services::{CourseServiceError, QuizServiceError, UserServiceError};
use crate::theme::{CurrentUser, StandardTemplateVars};

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marker left on responses that should be replaced by an error page
#[derive(Debug, Clone, Copy)]
pub struct ErrorPage {
    pub status: StatusCode,
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(e) => tracing::error!("Request failed: {:#}", e),
            Self::NotFound(what) => tracing::debug!("Not found: {}", what),
            Self::BadRequest(reason) => tracing::debug!("Bad request: {}", reason),
            Self::Forbidden => {}
        }

        let mut response = (status, status_title(status)).into_response();
        response.extensions_mut().insert(ErrorPage { status });
        response
    }
}

impl From<CourseServiceError> for WebError {
    fn from(e: CourseServiceError) -> Self {
        match e {
            CourseServiceError::NotFound(what) => Self::NotFound(what),
            CourseServiceError::ValidationError(msg) => Self::BadRequest(msg),
            CourseServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<QuizServiceError> for WebError {
    fn from(e: QuizServiceError) -> Self {
        match e {
            QuizServiceError::NotFound(what) => Self::NotFound(what),
            QuizServiceError::ValidationError(msg) => Self::BadRequest(msg),
            QuizServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<UserServiceError> for WebError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(_) => Self::Forbidden,
            UserServiceError::ValidationError(msg) => Self::BadRequest(msg),
            UserServiceError::UserExists(name) => Self::BadRequest(format!("User {} already exists", name)),
            UserServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

fn status_title(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "Page not found",
        StatusCode::FORBIDDEN => "Forbidden",
        StatusCode::BAD_REQUEST => "Bad request",
        _ => "Server error",
    }
}

/// Router fallback
pub async fn not_found() -> WebError {
    WebError::NotFound("no route".to_string())
}

/// Replace marked error responses with the rendered error page
pub async fn error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| CurrentUser::from(&u.0));

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    // navigation is best effort here, the page being rendered is already an error
    let nav_courses = state.course_service.nav_courses().await.unwrap_or_default();
    let newest_course = state.course_service.newest_course().await.unwrap_or(None);
    let vars = StandardTemplateVars::new(path)
        .with_user(user)
        .with_navigation(nav_courses, newest_course);

    let mut context = TeraContext::new();
    context.insert("status", &page.status.as_u16());
    context.insert("title", status_title(page.status));

    let body = match state
        .theme_engine
        .render_with_standard_vars("error.html", &context, &vars)
    {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render error page: {:#}", e);
            state.theme_engine.render_with_fallback("error.html", &context)
        }
    };

    (page.status, Html(body)).into_response()
}
