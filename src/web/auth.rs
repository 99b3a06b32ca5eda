//! Login and logout
//!
//! - GET /accounts/login/ - login form, `next` is carried along
//! - POST /accounts/login/ - check credentials, set the session cookie
//! - POST /accounts/logout/ - end the session

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::error::WebError;
use super::middleware::{read_cookie, safe_next, SESSION_COOKIE};
use super::page::Page;
use super::AppState;
use crate::forms::LoginForm;
use crate::services::{LoginInput, UserServiceError};

const DEFAULT_REDIRECT: &str = "/courses/";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts/login/", get(login_page).post(login))
        .route("/accounts/logout/", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

fn render_login(
    state: &AppState,
    page: Page,
    status: StatusCode,
    username: &str,
    next: Option<&str>,
    error: Option<&str>,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", &next);
    context.insert("error", &error);
    page.render_with_status(state, status, "accounts/login.html", &context)
}

async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    page: Page,
) -> Result<Response, WebError> {
    render_login(&state, page, StatusCode::OK, "", safe_next(query.next.as_deref()), None)
}

fn session_cookie(state: &AppState, token: &str) -> String {
    let max_age = state.session_expiration_days * 24 * 60 * 60;
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if state.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

async fn login(
    State(state): State<AppState>,
    page: Page,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let next = safe_next(form.next.as_deref()).map(str::to_string);
    let input = LoginInput {
        username: form.username.clone(),
        password: form.password,
    };

    let session = match state.user_service.login(input).await {
        Ok(session) => session,
        Err(UserServiceError::AuthenticationError(_)) => {
            return render_login(
                &state,
                page,
                StatusCode::OK,
                &form.username,
                next.as_deref(),
                Some("Please enter a correct username and password."),
            );
        }
        Err(e) => return Err(e.into()),
    };

    let cookie = HeaderValue::from_str(&session_cookie(&state, &session.id))
        .map_err(|e| WebError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))?;
    let target = next.as_deref().unwrap_or(DEFAULT_REDIRECT);

    let mut response = Redirect::to(target).into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        state.user_service.logout(&token).await?;
    }

    let clear = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let mut response = Redirect::to(DEFAULT_REDIRECT).into_response();
    if let Ok(value) = HeaderValue::from_str(&clear) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}
