//! Tests for the template engine

use super::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn engine() -> ThemeEngine {
    ThemeEngine::new(None).unwrap()
}

fn vars() -> StandardTemplateVars {
    StandardTemplateVars::new("/courses/").with_navigation(
        vec![
            CourseLink {
                id: 2,
                title: "Rust for Pythonistas".to_string(),
            },
            CourseLink {
                id: 1,
                title: "Python Basics".to_string(),
            },
        ],
        Some(CourseLink {
            id: 2,
            title: "Rust for Pythonistas".to_string(),
        }),
    )
}

fn listing_context() -> TeraContext {
    let mut context = TeraContext::new();
    context.insert(
        "courses",
        &json!([{
            "id": 1,
            "title": "Python Basics",
            "description": "Learn python",
            "teacher_username": "alice",
            "total_steps": 3
        }]),
    );
    context.insert("total", &3);
    context.insert("heading", "Courses");
    context.insert("query", &Option::<String>::None);
    context
}

#[test]
fn test_embedded_templates_loaded() {
    let engine = engine();

    for name in [
        "base.html",
        "error.html",
        "courses/course_list.html",
        "courses/course_detail.html",
        "courses/text_detail.html",
        "courses/quiz_detail.html",
        "courses/quiz_form.html",
        "courses/question_form.html",
        "courses/answer_form.html",
        "accounts/login.html",
        "admin/course_list.html",
        "admin/course_form.html",
        "admin/text_form.html",
        "admin/quiz_list.html",
        "admin/quiz_form.html",
    ] {
        assert!(engine.has_template(name), "missing {}", name);
    }
}

#[test]
fn test_render_with_standard_vars() {
    let engine = engine();

    let html = engine
        .render_with_standard_vars("courses/course_list.html", &listing_context(), &vars())
        .unwrap();

    assert!(html.contains("<title>Courses | Learning Site</title>"));
    assert!(html.contains("Python Basics"));
    assert!(html.contains("Total steps: 3"));
    assert!(html.contains("Newest: Rust for Pythonistas"));
    assert!(html.contains("/teacher/alice/"));
    assert!(html.contains("Log in"));
}

#[test]
fn test_current_user_and_messages() {
    let engine = engine();
    let vars = vars()
        .with_user(Some(CurrentUser {
            id: 1,
            username: "admin".to_string(),
            is_staff: true,
        }))
        .with_messages(vec!["Quiz added!".to_string()]);

    let html = engine
        .render_with_standard_vars("courses/course_list.html", &listing_context(), &vars)
        .unwrap();

    assert!(html.contains("Quiz added!"));
    assert!(html.contains("/admin/courses/"));
    assert!(html.contains("Log out"));
}

#[test]
fn test_text_detail_renders_markdown_and_reading_time() {
    let engine = engine();
    let content = format!("# Variables\n\n{}\n\n<script>alert(1)</script>", "word ".repeat(27));

    let mut context = TeraContext::new();
    context.insert("course", &json!({"id": 1, "title": "Python Basics"}));
    context.insert(
        "step",
        &json!({"id": 4, "title": "Variables", "description": "", "content": content}),
    );

    let html = engine
        .render_with_standard_vars("courses/text_detail.html", &context, &vars())
        .unwrap();

    assert!(html.contains("<h1>Variables</h1>"));
    // 27 words plus "#", "Variables" and the script tag
    assert!(html.contains("2 min. read"));
    assert!(!html.contains("<script>"));
}

#[test]
fn test_time_estimate_filter() {
    let mut tera = Tera::default();
    register_filters(&mut tera);

    let mut context = TeraContext::new();
    context.insert("words", &30);
    context.insert("text", &"one two three ".repeat(10));
    context.insert("nothing", &Option::<String>::None);

    let out = tera
        .render_str(
            "{{ words | time_estimate }}/{{ text | time_estimate }}/{{ nothing | time_estimate }}",
            &context,
        )
        .unwrap();
    assert_eq!(out, "2/2/0");
}

#[test]
fn test_time_estimate_filter_rejects_lists() {
    let result = time_estimate_filter(&json!([1, 2]), &HashMap::new());
    assert!(result.is_err());
}

#[test]
fn test_markdown_filter() {
    let mut tera = Tera::default();
    register_filters(&mut tera);

    let mut context = TeraContext::new();
    context.insert("content", "**bold**");

    let out = tera
        .render_str("{{ content | markdown_to_html | safe }}", &context)
        .unwrap();
    assert!(out.contains("<strong>bold</strong>"));

    assert_eq!(markdown_filter(&Value::Null, &HashMap::new()).unwrap(), json!(""));
}

#[test]
fn test_override_directory_replaces_template() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("courses")).unwrap();
    fs::write(
        dir.path().join("courses/course_list.html"),
        "custom listing: {{ total }}",
    )
    .unwrap();

    let engine = ThemeEngine::new(Some(dir.path())).unwrap();
    let html = engine
        .render_with_standard_vars("courses/course_list.html", &listing_context(), &vars())
        .unwrap();

    assert_eq!(html, "custom listing: 3");
    // untouched templates still come from the embedded set
    assert!(engine.has_template("courses/course_detail.html"));
}

#[test]
fn test_missing_override_directory_uses_embedded() {
    let dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(Some(dir.path().join("nope").as_path())).unwrap();

    assert!(engine.has_template("base.html"));
}

#[test]
fn test_invalid_override_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("error.html"), "{% block content %}unclosed").unwrap();

    assert!(ThemeEngine::new(Some(dir.path())).is_err());
}

#[test]
fn test_render_missing_template_fails() {
    let engine = engine();
    let err = engine.render("missing.html", &TeraContext::new()).unwrap_err();

    assert!(err.to_string().contains("missing.html"));
}

#[test]
fn test_render_with_fallback_uses_error_page() {
    let engine = engine();

    let html = engine.render_with_fallback("missing.html", &TeraContext::new());

    assert!(html.contains("<h1>500</h1>"));
    assert!(html.contains("Server error"));
}

#[test]
fn test_render_with_fallback_simple_page() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("error.html"), "{{ undefined_variable.field }}").unwrap();
    let engine = ThemeEngine::new(Some(dir.path())).unwrap();

    let html = engine.render_with_fallback("missing.html", &TeraContext::new());

    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("Something went wrong"));
}

#[test]
fn test_current_user_from_user() {
    let now = chrono::Utc::now();
    let user = User {
        id: 7,
        username: "teacher".to_string(),
        email: "t@example.com".to_string(),
        password_hash: "x".to_string(),
        role: crate::models::UserRole::Teacher,
        created_at: now,
        updated_at: now,
    };

    let current = CurrentUser::from(&user);
    assert_eq!(current.id, 7);
    assert_eq!(current.username, "teacher");
    assert!(!current.is_staff);
}
