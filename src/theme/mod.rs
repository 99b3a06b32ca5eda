//! Template engine
//!
//! Pages are rendered with Tera. The default templates are embedded in the
//! binary; an optional directory can override any of them by name.
//! Features:
//! - Embedded default templates with per-file overrides
//! - `time_estimate` and `markdown_to_html` filters
//! - Standard page variables (navigation, current user, flash messages)
//! - Fallback error page when a template fails to render

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera, Value};

use crate::models::{CourseLink, User};
use crate::services::markdown::{markdown_to_html, time_estimate, word_count};

mod error;

pub use error::ThemeError;

/// Default templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

pub const SITE_NAME: &str = "Learning Site";

/// Template engine for rendering pages
pub struct ThemeEngine {
    tera: Tera,
    /// Directory whose templates replace the embedded ones
    override_path: Option<PathBuf>,
}

impl ThemeEngine {
    /// Load the embedded templates, then any overrides from `override_path`
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: override_path.map(Path::to_path_buf),
        };
        engine.load_templates()?;
        Ok(engine)
    }

    fn load_templates(&mut self) -> Result<()> {
        let mut templates: HashMap<String, String> = HashMap::new();

        for name in DefaultTemplates::iter() {
            if let Some(file) = DefaultTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .with_context(|| format!("Embedded template {} is not UTF-8", name))?;
                templates.insert(name.to_string(), content);
            }
        }

        if let Some(ref path) = self.override_path {
            if path.is_dir() {
                let mut overrides = Vec::new();
                collect_templates_from_dir(path, path, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::debug!("Template override: {}", name);
                    templates.insert(name, content);
                }
            } else {
                tracing::warn!(
                    "Template directory {:?} not found, using embedded templates",
                    path
                );
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(error_chain("Failed to load templates", &e)))?;
        register_filters(&mut tera);

        self.tera = tera;
        Ok(())
    }

    /// Render a template
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(error_chain(&format!("Failed to render '{}'", template), &e)).into()
        })
    }

    /// Render a template with the standard page variables added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();

        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("nav_courses", &standard_vars.nav_courses);
        full_context.insert("newest_course", &standard_vars.newest_course);
        full_context.insert("messages", &standard_vars.messages);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    /// Render a template, falling back to `error.html` and then to a plain
    /// HTML page if that fails too
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {:#}", template, e);

                let mut error_context = context.clone();
                error_context.insert("status", &500);
                error_context.insert("title", "Server error");
                let vars = StandardTemplateVars::new("/");
                match self.render_with_standard_vars("error.html", &error_context, &vars) {
                    Ok(html) => html,
                    Err(_) => Self::simple_error_page(),
                }
            }
        }
    }

    fn simple_error_page() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Server error</title>
</head>
<body>
    <h1>Server error</h1>
    <p>Something went wrong while rendering this page.</p>
</body>
</html>"#
            .to_string()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::from)? {
        let path = entry.map_err(ThemeError::from)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn error_chain(prefix: &str, error: &tera::Error) -> String {
    let mut message = format!("{}: {}", prefix, error);
    let mut source = error.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn register_filters(tera: &mut Tera) {
    tera.register_filter("time_estimate", time_estimate_filter);
    tera.register_filter("markdown_to_html", markdown_filter);
}

/// `{{ words | time_estimate }}`: minutes to read a word count, or a text
fn time_estimate_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let words = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(s) => word_count(s),
        Value::Null => 0,
        other => {
            return Err(tera::Error::msg(format!(
                "time_estimate expects a number or text, got {}",
                other
            )))
        }
    };
    Ok(Value::from(time_estimate(words)))
}

/// `{{ text.content | markdown_to_html | safe }}`
fn markdown_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(markdown_to_html(s))),
        Value::Null => Ok(Value::String(String::new())),
        other => Err(tera::Error::msg(format!(
            "markdown_to_html expects text, got {}",
            other
        ))),
    }
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub request_path: String,
    pub current_user: Option<CurrentUser>,
    /// Most recent published courses
    pub nav_courses: Vec<CourseLink>,
    pub newest_course: Option<CourseLink>,
    /// Flash messages consumed by this request
    pub messages: Vec<String>,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            site_name: SITE_NAME.to_string(),
            request_path: request_path.into(),
            current_user: None,
            nav_courses: Vec::new(),
            newest_course: None,
            messages: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: Option<CurrentUser>) -> Self {
        self.current_user = user;
        self
    }

    pub fn with_navigation(mut self, nav_courses: Vec<CourseLink>, newest_course: Option<CourseLink>) -> Self {
        self.nav_courses = nav_courses;
        self.newest_course = newest_course;
        self
    }

    pub fn with_messages(mut self, messages: Vec<String>) -> Self {
        self.messages = messages;
        self
    }
}

#[cfg(test)]
mod tests;
