//! Page rendering and flash messages
//!
//! [`Page`] gathers the variables every template needs (current user,
//! navigation courses, pending flash messages). Flash messages travel in a
//! short-lived `messages` cookie set on a redirect and cleared by the next
//! rendered page.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use tera::Context as TeraContext;

use super::error::WebError;
use super::middleware::{read_cookie, AuthenticatedUser};
use super::AppState;
use crate::theme::{CurrentUser, StandardTemplateVars};

pub const FLASH_COOKIE: &str = "messages";

const CLEAR_FLASH: &str = "messages=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

/// Per-request template variables
pub struct Page {
    vars: StandardTemplateVars,
}

impl FromRequestParts<AppState> for Page {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|u| CurrentUser::from(&u.0));
        let messages = read_flash(&parts.headers);
        let nav_courses = state.course_service.nav_courses().await?;
        let newest_course = state.course_service.newest_course().await?;

        Ok(Self {
            vars: StandardTemplateVars::new(parts.uri.path())
                .with_user(user)
                .with_navigation(nav_courses, newest_course)
                .with_messages(messages),
        })
    }
}

impl Page {
    pub fn render(self, state: &AppState, template: &str, context: &TeraContext) -> Result<Response, WebError> {
        self.render_with_status(state, StatusCode::OK, template, context)
    }

    pub fn render_with_status(
        self,
        state: &AppState,
        status: StatusCode,
        template: &str,
        context: &TeraContext,
    ) -> Result<Response, WebError> {
        let html = state
            .theme_engine
            .render_with_standard_vars(template, context, &self.vars)?;

        let mut response = (status, Html(html)).into_response();
        if !self.vars.messages.is_empty() {
            response
                .headers_mut()
                .append(header::SET_COOKIE, HeaderValue::from_static(CLEAR_FLASH));
        }
        Ok(response)
    }
}

/// Messages left by the previous response
fn read_flash(headers: &axum::http::HeaderMap) -> Vec<String> {
    read_cookie(headers, FLASH_COOKIE)
        .and_then(|raw| urlencoding::decode(&raw).ok().map(|s| s.into_owned()))
        .map(|decoded| {
            decoded
                .split('\n')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn flash_cookie(message: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(message)
    )
}

/// 303 redirect carrying a flash message for the next page
pub fn redirect_with_flash(to: &str, message: &str) -> Response {
    let mut response = Redirect::to(to).into_response();
    match HeaderValue::from_str(&flash_cookie(message)) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Dropping flash message: {}", e),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_flash_round_trip_through_cookie() {
        let cookie = flash_cookie("Updated Loops & Lists; part 1");
        let value = cookie
            .split_once(';')
            .map(|(kv, _)| kv.to_string())
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&value).unwrap());

        assert_eq!(read_flash(&headers), vec!["Updated Loops & Lists; part 1".to_string()]);
    }

    #[test]
    fn test_redirect_with_flash() {
        let response = redirect_with_flash("/courses/1/quiz/2/", "Quiz added!");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/courses/1/quiz/2/");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("messages=Quiz%20added%21"));
    }

    #[test]
    fn test_no_flash_cookie() {
        assert!(read_flash(&HeaderMap::new()).is_empty());
    }
}
