//! Web layer - HTML pages, forms and routing
//!
//! - Public course browsing, teacher pages and search
//! - Login and logout
//! - Quiz, question and answer authoring (login required)
//! - Admin console (staff only)

pub mod admin;
pub mod auth;
pub mod authoring;
pub mod courses;
pub mod error;
pub mod middleware;
pub mod page;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCourseRepository, SqlxQuestionRepository, SqlxQuizRepository, SqlxSessionRepository,
    SqlxTextRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{CourseService, QuizService, UserService};
use crate::theme::ThemeEngine;

pub use error::WebError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub course_service: Arc<CourseService>,
    pub quiz_service: Arc<QuizService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub session_expiration_days: i64,
    pub secure_cookie: bool,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let text_repo = SqlxTextRepository::boxed(pool.clone());
        let quiz_repo = SqlxQuizRepository::boxed(pool.clone());
        let question_repo = SqlxQuestionRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool);

        let user_service = UserService::with_session_expiration(
            user_repo,
            session_repo,
            config.session.expiration_days,
        );
        let course_service = CourseService::new(course_repo.clone(), text_repo, quiz_repo.clone());
        let quiz_service = QuizService::new(course_repo, quiz_repo, question_repo);
        let theme_engine = ThemeEngine::new(config.templates.path.as_deref())?;

        Ok(Self {
            user_service: Arc::new(user_service),
            course_service: Arc::new(course_service),
            quiz_service: Arc::new(quiz_service),
            theme_engine: Arc::new(theme_engine),
            session_expiration_days: config.session.expiration_days,
            secure_cookie: config.session.secure_cookie,
        })
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(courses::router())
        .merge(auth::router())
        .merge(authoring::router())
        .merge(admin::router())
        .fallback(error::not_found)
        .layer(axum_middleware::from_fn_with_state(state.clone(), error::error_pages))
        // Session lookup runs before the error pages so they show the user
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
