//! Web middleware
//!
//! Contains middleware for:
//! - Authentication (session cookie lookup on every request)
//! - Login requirement for authoring routes (redirect to the login page)
//! - Staff requirement for the admin console

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::error::WebError;
use super::AppState;
use crate::models::User;

pub const SESSION_COOKIE: &str = "session";
pub const LOGIN_URL: &str = "/accounts/login/";

/// Authenticated user, stored in the request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(WebError::Forbidden)
    }
}

/// Read a cookie value from the request headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// Resolve the session cookie, if any, to a user
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = read_cookie(request.headers(), SESSION_COOKIE) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Login URL that returns to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, urlencoding::encode(next))
}

fn redirect_to_login(request: &Request) -> Response {
    let next = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&login_url(next)).into_response()
}

/// Send anonymous requests to the login page
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return redirect_to_login(&request);
    }
    next.run(request).await
}

/// Admin console access: anonymous users log in first, other users get 403
pub async fn require_staff(request: Request, next: Next) -> Response {
    let user = match request.extensions().get::<AuthenticatedUser>() {
        Some(user) => user,
        None => return redirect_to_login(&request),
    };
    if !user.0.is_staff() {
        tracing::info!("User {} denied admin access", user.0.username);
        return WebError::Forbidden.into_response();
    }
    next.run(request).await
}

/// Only local absolute paths are accepted as a post-login target
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    local.then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use axum::{body::Body, http::HeaderValue, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn user(role: UserRole) -> AuthenticatedUser {
        let now = chrono::Utc::now();
        AuthenticatedUser(User {
            id: 1,
            username: "alice".to_string(),
            email: String::new(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn call(router: Router, uri: &str, as_user: Option<AuthenticatedUser>) -> Response {
        let mut request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        if let Some(u) = as_user {
            request.extensions_mut().insert(u);
        }
        router.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; messages="),
        );

        assert_eq!(read_cookie(&headers, "session"), Some("abc123".to_string()));
        assert_eq!(read_cookie(&headers, "messages"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(
            login_url("/courses/1/quiz/add/"),
            "/accounts/login/?next=%2Fcourses%2F1%2Fquiz%2Fadd%2F"
        );
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/courses/3/")), Some("/courses/3/"));
        assert_eq!(safe_next(Some("//evil.example.com/")), None);
        assert_eq!(safe_next(Some("https://evil.example.com/")), None);
        assert_eq!(safe_next(Some("/\\evil.example.com")), None);
        assert_eq!(safe_next(None), None);
    }

    #[tokio::test]
    async fn test_require_login() {
        let router = || {
            Router::new()
                .route("/guarded/", get(|| async { "ok" }))
                .route_layer(middleware::from_fn(require_login))
        };

        let response = call(router(), "/guarded/?tab=1", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/accounts/login/?next=%2Fguarded%2F%3Ftab%3D1"
        );

        let response = call(router(), "/guarded/", Some(user(UserRole::Teacher))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_staff() {
        let router = || {
            Router::new()
                .route("/guarded/", get(|| async { "ok" }))
                .route_layer(middleware::from_fn(require_staff))
        };

        let response = call(router(), "/guarded/", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = call(router(), "/guarded/", Some(user(UserRole::Teacher))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(router(), "/guarded/", Some(user(UserRole::Admin))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
