//! HTML form handling
//!
//! Handlers receive url-encoded bodies as `Form<Vec<(String, String)>>`,
//! wrap them in [`FormData`] and hand them to a form type. A form keeps the
//! raw submitted values so an invalid submission can be rendered again with
//! field-level error messages next to what the user typed.

mod admin;
mod answers;
mod quiz;

pub use admin::{AdminQuizForm, CourseForm, CourseListAction, LoginForm, TextForm};
pub use answers::{AnswerFormSet, AnswerRow, ANSWER_PREFIX};
pub use quiz::{QuestionForm, QuizForm};

use serde::Serialize;
use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_A_NUMBER: &str = "Enter a whole number.";

/// Submitted form fields in request order
#[derive(Debug, Clone, Default)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value submitted under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value submitted under `key`
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Trimmed text value, empty when absent
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(str::trim).unwrap_or_default().to_string()
    }

    /// Checkbox state: present means checked unless the value is an
    /// explicit false
    pub fn checked(&self, key: &str) -> bool {
        match self.get(key) {
            Some(value) => !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off"),
            None => false,
        }
    }

    /// Field-value pairs whose key starts with `prefix`, with the prefix
    /// stripped
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.pairs
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }
}

/// Validation messages, per field and for the form as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Required text field of at most `max_len` characters
pub(crate) fn required_text(value: &str, field: &str, max_len: Option<usize>, errors: &mut FormErrors) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    } else if let Some(max) = max_len {
        let len = value.chars().count();
        if len > max {
            errors.add(
                field,
                format!("Ensure this value has at most {} characters (it has {}).", max, len),
            );
        }
    }
}

/// Integer field; blank falls back to `default`
pub(crate) fn integer(value: &str, field: &str, default: i32, errors: &mut FormErrors) -> i32 {
    let value = value.trim();
    if value.is_empty() {
        return default;
    }
    match value.parse::<i32>() {
        Ok(n) => n,
        Err(_) => {
            errors.add(field, NOT_A_NUMBER);
            default
        }
    }
}
